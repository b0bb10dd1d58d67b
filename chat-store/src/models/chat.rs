use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::user::UserStatus;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Individual,
    Group,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Filled from the chat map key when absent in the fixture.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    #[serde(default)]
    pub messages: IndexMap<String, Message>,
}

impl Chat {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Latest timestamp among stored messages.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.messages.values().map(|m| m.timestamp).max()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub admins: Vec<String>,
}

/// A chat as listed for one user: chat metadata merged with that user's summary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    pub name: String,
    pub last_message: Option<String>,
    pub last_user: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub unread_count: u32,
}

/// Friend entry as shown in the friends list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    pub id: String,
    pub username: String,
    pub status: UserStatus,
    pub friendship_status: String,
    pub friends_since: Option<String>,
}

/// Chat participant as shown on the group info page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: String,
    pub username: String,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub is_creator: bool,
}
