use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::fixture::{Fixture, SEED_FIXTURE};
use crate::models::{
    Chat, ChatSummary, ChatType, ChatView, FriendView, Message, MemberView, User, UserStatus,
};
use crate::utils::{generate_message_id, next_timestamp};

/// Username shown for ids that have no user record
pub const UNKNOWN_USERNAME: &str = "Unknown";

/// In-memory store of users, chats and messages.
///
/// Writes to one chat are serialized by a per-chat lock, and every check
/// that can fail runs before the first write. The store never holds two
/// map guards at once; readers are not blocked and may see a new message
/// before the participants' summaries catch up.
pub struct ChatStore {
    users: DashMap<String, User>,
    chats: DashMap<String, Chat>,
    /// chat_id -> writer lock
    chat_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            chats: DashMap::new(),
            chat_locks: DashMap::new(),
        }
    }

    /// Build a store from a fixture, validating it first
    pub fn from_fixture(fixture: Fixture) -> Result<Self> {
        Ok(Self::from_prepared(fixture.prepare()?))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_prepared(Fixture::from_json(json)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_prepared(Fixture::load(path)?))
    }

    /// Store over the bundled seed dataset
    pub fn seeded() -> Result<Self> {
        Self::from_json(SEED_FIXTURE)
    }

    fn from_prepared(fixture: Fixture) -> Self {
        let store = Self::new();
        for (id, user) in fixture.users {
            store.users.insert(id, user);
        }
        for (id, chat) in fixture.chats {
            store.chats.insert(id, chat);
        }
        store
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    /// Resolve the caller's own user record
    pub fn get_current_user(&self, current_user_id: &str) -> Option<User> {
        let user = self.get_user_by_id(current_user_id);
        if user.is_none() {
            debug!("Current user {} not found", current_user_id);
        }
        user
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|u| u.value().clone())
    }

    /// List the user's chats, one entry per `chatUser` key in insertion order
    pub fn get_chats(&self, current_user_id: &str) -> Vec<ChatView> {
        let summaries: Vec<(String, ChatSummary)> = match self.users.get(current_user_id) {
            Some(user) => user
                .chat_user
                .iter()
                .map(|(id, s)| (id.clone(), s.clone()))
                .collect(),
            None => {
                debug!("get_chats: unknown user {}", current_user_id);
                return Vec::new();
            }
        };

        summaries
            .into_iter()
            .map(|(chat_id, summary)| {
                let (chat_type, participants, group) = match self.chats.get(&chat_id) {
                    Some(chat) => (chat.chat_type, chat.participants.clone(), chat.group.clone()),
                    // Validated fixtures never hold a summary for a missing chat
                    None => {
                        warn!(
                            "User {} has a summary for missing chat {}",
                            current_user_id, chat_id
                        );
                        Default::default()
                    }
                };
                ChatView {
                    id: chat_id,
                    chat_type,
                    participants,
                    group,
                    name: summary.name,
                    last_message: summary.last_message,
                    last_user: summary.last_user,
                    timestamp: summary.timestamp,
                    unread_count: summary.unread_count,
                }
            })
            .collect()
    }

    pub fn get_chat_by_id(&self, chat_id: &str) -> Option<Chat> {
        self.chats.get(chat_id).map(|c| c.value().clone())
    }

    /// Participant ids of a chat; empty for unknown chats
    pub fn get_participants(&self, chat_id: &str) -> Vec<String> {
        self.chats
            .get(chat_id)
            .map(|c| c.participants.clone())
            .unwrap_or_default()
    }

    /// All messages of a chat, oldest first; equal timestamps keep insertion order
    pub fn get_messages_by_chat_id(&self, chat_id: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = match self.chats.get(chat_id) {
            Some(chat) => chat.messages.values().cloned().collect(),
            None => {
                debug!("get_messages: unknown chat {}", chat_id);
                return Vec::new();
            }
        };
        messages.sort_by_key(|m| m.timestamp);
        messages
    }

    /// Append a message and update every participant's summary.
    ///
    /// The sender's unread count resets to 0; every other participant's
    /// count goes up by one. Fails only when the chat does not exist.
    pub fn send_message(&self, chat_id: &str, content: &str, sender_id: &str) -> Result<Message> {
        if !self.chats.contains_key(chat_id) {
            warn!("Refusing to send to unknown chat {}", chat_id);
            return Err(StoreError::UnknownChat(chat_id.to_string()));
        }

        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (message, chat_type, participants, group_title) = {
            let mut chat = self
                .chats
                .get_mut(chat_id)
                .ok_or_else(|| StoreError::UnknownChat(chat_id.to_string()))?;

            let mut id = generate_message_id();
            while chat.messages.contains_key(&id) {
                id = generate_message_id();
            }
            let message = Message {
                id: id.clone(),
                chat_id: chat_id.to_string(),
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                timestamp: next_timestamp(chat.latest_timestamp()),
                read: false,
            };
            chat.messages.insert(id, message.clone());

            (
                message,
                chat.chat_type,
                chat.participants.clone(),
                chat.group.as_ref().map(|g| g.title.clone()),
            )
        };

        // Names are resolved up front so no user guard is held during lookups.
        let names: Vec<(String, String)> = participants
            .iter()
            .map(|p| {
                let name = self.default_summary_name(
                    chat_id,
                    chat_type,
                    &participants,
                    group_title.as_deref(),
                    p,
                );
                (p.clone(), name)
            })
            .collect();

        for (participant, default_name) in names {
            let Some(mut user) = self.users.get_mut(&participant) else {
                warn!(
                    "Participant {} of chat {} has no user record, skipping summary",
                    participant, chat_id
                );
                continue;
            };
            let summary = user
                .chat_user
                .entry(chat_id.to_string())
                .or_insert_with(|| ChatSummary::new(default_name));
            summary.last_message = Some(message.content.clone());
            summary.last_user = Some(sender_id.to_string());
            summary.timestamp = Some(message.timestamp);
            if participant == sender_id {
                summary.unread_count = 0;
            } else {
                summary.unread_count = summary.unread_count.saturating_add(1);
            }
        }

        info!(
            chat_id = %chat_id,
            message_id = %message.id,
            sender_id = %sender_id,
            "Message stored"
        );
        Ok(message)
    }

    /// Reset the user's unread count for the chat and mark every unread
    /// message sent by someone else as read.
    ///
    /// Returns how many messages changed. Unknown chats and non-participants
    /// are a no-op.
    pub fn mark_chat_as_read(&self, chat_id: &str, current_user_id: &str) -> usize {
        if !self.chats.contains_key(chat_id) {
            debug!("mark_chat_as_read: unknown chat {}", chat_id);
            return 0;
        }

        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let marked = match self.chats.get_mut(chat_id) {
            Some(mut chat) => {
                if !chat.is_participant(current_user_id) {
                    warn!(
                        "User {} tried to mark chat {} read without being a participant",
                        current_user_id, chat_id
                    );
                    return 0;
                }
                let mut marked = 0;
                for message in chat.messages.values_mut() {
                    if !message.read && message.sender_id != current_user_id {
                        message.read = true;
                        marked += 1;
                    }
                }
                marked
            }
            None => return 0,
        };

        if let Some(mut user) = self.users.get_mut(current_user_id) {
            if let Some(summary) = user.chat_user.get_mut(chat_id) {
                summary.unread_count = 0;
            }
        }

        if marked > 0 {
            info!(
                chat_id = %chat_id,
                user_id = %current_user_id,
                marked,
                "Chat marked as read"
            );
        }
        marked
    }

    /// Friends of the user with names and presence resolved.
    /// Friend ids with no user record show as "Unknown" and offline.
    pub fn get_friends_list(&self, current_user_id: &str) -> Vec<FriendView> {
        let friends = match self.users.get(current_user_id) {
            Some(user) => user.friends.clone(),
            None => return Vec::new(),
        };

        friends
            .into_iter()
            .map(|(friend_id, friendship)| {
                let (username, status) = self.resolve_name_and_status(&friend_id);
                FriendView {
                    id: friend_id,
                    username,
                    status,
                    friendship_status: friendship.status,
                    friends_since: friendship.since,
                }
            })
            .collect()
    }

    /// Participants of a chat in participant order, with their group roles
    pub fn get_chat_members(&self, chat_id: &str) -> Vec<MemberView> {
        let (participants, group) = match self.chats.get(chat_id) {
            Some(chat) => (chat.participants.clone(), chat.group.clone()),
            None => return Vec::new(),
        };

        participants
            .into_iter()
            .map(|id| {
                let avatar = self.users.get(&id).and_then(|u| u.avatar.clone());
                let (username, status) = self.resolve_name_and_status(&id);
                let (is_admin, is_creator) = match &group {
                    Some(g) => (g.admins.contains(&id), g.created_by == id),
                    None => (false, false),
                };
                MemberView {
                    id,
                    username,
                    status,
                    avatar,
                    is_admin,
                    is_creator,
                }
            })
            .collect()
    }

    /// Update a user's presence. Returns false for unknown users.
    pub fn set_user_status(&self, user_id: &str, status: UserStatus) -> bool {
        match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.status = status;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the whole store, users and chats sorted by id.
    /// Not atomic with respect to concurrent writers.
    pub fn export(&self) -> Fixture {
        let mut users: Vec<(String, User)> = self
            .users
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        users.sort_by(|a, b| a.0.cmp(&b.0));

        let mut chats: Vec<(String, Chat)> = self
            .chats
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        chats.sort_by(|a, b| a.0.cmp(&b.0));

        Fixture {
            users: users.into_iter().collect(),
            chats: chats.into_iter().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        self.export().to_json()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        self.export().to_json_pretty()
    }

    fn chat_lock(&self, chat_id: &str) -> Arc<Mutex<()>> {
        self.chat_locks
            .entry(chat_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn resolve_name_and_status(&self, user_id: &str) -> (String, UserStatus) {
        match self.users.get(user_id) {
            Some(user) => (user.username.clone(), user.status),
            None => (UNKNOWN_USERNAME.to_string(), UserStatus::Offline),
        }
    }

    /// Name for a summary created on first message: the group title, or
    /// the other participant's username.
    fn default_summary_name(
        &self,
        chat_id: &str,
        chat_type: ChatType,
        participants: &[String],
        group_title: Option<&str>,
        viewer_id: &str,
    ) -> String {
        match chat_type {
            ChatType::Group => group_title.unwrap_or(chat_id).to_string(),
            ChatType::Individual => participants
                .iter()
                .find(|p| p.as_str() != viewer_id)
                .map(|other| self.resolve_name_and_status(other).0)
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
        }
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "users": {
            "u1": {
                "id": "u1", "username": "alice", "status": "online",
                "chatUser": {
                    "c1": {"name": "bob", "unreadCount": 2},
                    "g1": {"name": "Crew", "unreadCount": 0}
                },
                "friends": {
                    "u2": {"status": "accepted", "since": "2023-01-01"},
                    "ghost": {"status": "pending"}
                }
            },
            "u2": {
                "id": "u2", "username": "bob",
                "chatUser": {"c1": {"name": "alice", "unreadCount": 0}}
            },
            "u3": {"id": "u3", "username": "carol"}
        },
        "chats": {
            "c1": {
                "id": "c1", "type": "individual", "participants": ["u1", "u2"],
                "messages": {
                    "m1": {"id": "m1", "chatId": "c1", "senderId": "u2", "content": "first", "timestamp": "2024-01-01T10:00:00Z", "read": false},
                    "m2": {"id": "m2", "chatId": "c1", "senderId": "u2", "content": "second", "timestamp": "2024-01-01T10:01:00Z", "read": false},
                    "m3": {"id": "m3", "chatId": "c1", "senderId": "u1", "content": "mine", "timestamp": "2024-01-01T10:02:00Z", "read": false}
                }
            },
            "g1": {
                "id": "g1", "type": "group", "participants": ["u1", "u2", "u3"],
                "group": {"title": "Crew", "createdBy": "u1", "admins": ["u1"]}
            },
            "c9": {"id": "c9", "type": "individual", "participants": ["u2", "u3"]}
        }
    }"#;

    fn store() -> ChatStore {
        ChatStore::from_json(FIXTURE).unwrap()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = ChatStore::new();
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.chat_count(), 0);
        assert!(store.get_chats("u1").is_empty());
    }

    #[test]
    fn test_get_user_and_current_user() {
        let store = store();
        assert_eq!(store.get_user_by_id("u2").unwrap().username, "bob");
        assert_eq!(store.get_current_user("u1").unwrap().username, "alice");
        assert!(store.get_user_by_id("nobody").is_none());
        assert!(store.get_current_user("nobody").is_none());
    }

    #[test]
    fn test_get_chats_keeps_summary_order() {
        let chats = store().get_chats("u1");
        let ids: Vec<&str> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "g1"]);
        assert_eq!(chats[0].name, "bob");
        assert_eq!(chats[0].unread_count, 2);
        assert_eq!(chats[1].chat_type, ChatType::Group);
        assert_eq!(chats[1].group.as_ref().unwrap().title, "Crew");
    }

    #[test]
    fn test_get_chats_for_user_without_summaries() {
        assert!(store().get_chats("u3").is_empty());
    }

    #[test]
    fn test_get_chat_by_id() {
        let store = store();
        let chat = store.get_chat_by_id("c1").unwrap();
        assert_eq!(chat.participants, vec!["u1", "u2"]);
        assert_eq!(chat.messages.len(), 3);
        assert!(store.get_chat_by_id("missing").is_none());
        assert_eq!(store.get_participants("g1"), vec!["u1", "u2", "u3"]);
        assert!(store.get_participants("missing").is_empty());
    }

    #[test]
    fn test_messages_sorted_with_ties_in_insertion_order() {
        let json = r#"{
            "chats": {
                "c1": {
                    "id": "c1", "type": "individual", "participants": ["u1", "u2"],
                    "messages": {
                        "m4": {"id": "m4", "chatId": "c1", "senderId": "u1", "content": "last", "timestamp": "2024-01-01T12:00:00Z"},
                        "m2": {"id": "m2", "chatId": "c1", "senderId": "u2", "content": "tie a", "timestamp": "2024-01-01T11:00:00Z"},
                        "m1": {"id": "m1", "chatId": "c1", "senderId": "u1", "content": "first", "timestamp": "2024-01-01T10:00:00Z"},
                        "m3": {"id": "m3", "chatId": "c1", "senderId": "u1", "content": "tie b", "timestamp": "2024-01-01T11:00:00Z"}
                    }
                }
            }
        }"#;
        let store = ChatStore::from_json(json).unwrap();
        let ids: Vec<String> = store
            .get_messages_by_chat_id("c1")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_messages_for_unknown_chat_are_empty() {
        let store = store();
        assert!(store.get_messages_by_chat_id("missing").is_empty());
        assert!(store.get_messages_by_chat_id("g1").is_empty());
    }

    #[test]
    fn test_send_message_updates_summaries() {
        let store = store();
        let message = store.send_message("c1", "hello", "u1").unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.sender_id, "u1");
        assert_eq!(message.chat_id, "c1");
        assert!(!message.read);

        let alice = store.get_user_by_id("u1").unwrap();
        let bob = store.get_user_by_id("u2").unwrap();
        assert_eq!(alice.chat_user["c1"].unread_count, 0);
        assert_eq!(bob.chat_user["c1"].unread_count, 1);
        assert_eq!(bob.chat_user["c1"].last_message.as_deref(), Some("hello"));
        assert_eq!(bob.chat_user["c1"].last_user.as_deref(), Some("u1"));
        assert_eq!(bob.chat_user["c1"].timestamp, Some(message.timestamp));

        let last = store.get_messages_by_chat_id("c1").pop().unwrap();
        assert_eq!(last, message);
    }

    #[test]
    fn test_send_message_to_unknown_chat_fails() {
        let store = store();
        let err = store.send_message("nope", "hello", "u1").unwrap_err();
        assert!(matches!(err, StoreError::UnknownChat(ref id) if id == "nope"));
        assert!(store.chat_locks.is_empty());
    }

    #[test]
    fn test_send_message_creates_missing_summaries() {
        let store = store();
        store.send_message("g1", "hi all", "u1").unwrap();

        // u2 and u3 had no summary for g1
        let bob = store.get_user_by_id("u2").unwrap();
        assert_eq!(bob.chat_user["g1"].name, "Crew");
        assert_eq!(bob.chat_user["g1"].unread_count, 1);
        let carol = store.get_user_by_id("u3").unwrap();
        assert_eq!(carol.chat_user["g1"].unread_count, 1);

        store.send_message("c9", "yo", "u2").unwrap();
        let carol = store.get_user_by_id("u3").unwrap();
        assert_eq!(carol.chat_user["c9"].name, "bob");
        let bob = store.get_user_by_id("u2").unwrap();
        assert_eq!(bob.chat_user["c9"].name, "carol");
        assert_eq!(bob.chat_user["c9"].unread_count, 0);
    }

    #[test]
    fn test_mark_chat_as_read_marks_all_unread_from_others() {
        let store = store();
        assert_eq!(store.mark_chat_as_read("c1", "u1"), 2);

        let messages = store.get_messages_by_chat_id("c1");
        assert!(messages[0].read);
        assert!(messages[1].read);
        // alice's own message stays unread for bob
        assert!(!messages[2].read);

        let alice = store.get_user_by_id("u1").unwrap();
        assert_eq!(alice.chat_user["c1"].unread_count, 0);

        assert_eq!(store.mark_chat_as_read("c1", "u1"), 0);
    }

    #[test]
    fn test_mark_chat_as_read_ignores_outsiders_and_unknown_chats() {
        let store = store();
        assert_eq!(store.mark_chat_as_read("c1", "u3"), 0);
        assert_eq!(store.mark_chat_as_read("missing", "u1"), 0);
        assert!(store
            .get_messages_by_chat_id("c1")
            .iter()
            .all(|m| !m.read));
    }

    #[test]
    fn test_friends_list_resolves_and_degrades() {
        let friends = store().get_friends_list("u1");
        assert_eq!(friends.len(), 2);
        assert_eq!(friends[0].id, "u2");
        assert_eq!(friends[0].username, "bob");
        assert_eq!(friends[0].friendship_status, "accepted");
        assert_eq!(friends[0].friends_since.as_deref(), Some("2023-01-01"));
        assert_eq!(friends[1].username, UNKNOWN_USERNAME);
        assert_eq!(friends[1].status, UserStatus::Offline);
        assert_eq!(friends[1].friendship_status, "pending");

        assert!(store().get_friends_list("missing").is_empty());
    }

    #[test]
    fn test_chat_members_carry_roles() {
        let members = store().get_chat_members("g1");
        assert_eq!(members.len(), 3);
        assert!(members[0].is_admin && members[0].is_creator);
        assert!(!members[1].is_admin && !members[1].is_creator);
        assert_eq!(members[2].username, "carol");

        let members = store().get_chat_members("c1");
        assert!(members.iter().all(|m| !m.is_admin && !m.is_creator));
        assert!(store().get_chat_members("missing").is_empty());
    }

    #[test]
    fn test_set_user_status() {
        let store = store();
        assert!(store.set_user_status("u2", UserStatus::Online));
        assert_eq!(store.get_user_by_id("u2").unwrap().status, UserStatus::Online);
        assert!(!store.set_user_status("missing", UserStatus::Online));
    }

    #[test]
    fn test_export_sorts_by_id() {
        let fixture = store().export();
        let user_ids: Vec<&String> = fixture.users.keys().collect();
        assert_eq!(user_ids, vec!["u1", "u2", "u3"]);
        let chat_ids: Vec<&String> = fixture.chats.keys().collect();
        assert_eq!(chat_ids, vec!["c1", "c9", "g1"]);
    }

    #[test]
    fn test_seeded_store_loads() {
        let store = ChatStore::seeded().unwrap();
        assert!(store.get_current_user("u1").is_some());
        assert_eq!(store.get_chats("u1").len(), 3);
    }
}
