//! Model invariant checks run when a fixture is loaded.

use std::collections::HashSet;

use crate::models::{Chat, ChatType, User};

/// Validate participants and group metadata of a chat
pub fn validate_chat(chat: &Chat) -> Result<(), String> {
    if chat.id.is_empty() {
        return Err("Chat id cannot be empty".to_string());
    }

    let mut seen = HashSet::new();
    for participant in &chat.participants {
        if !seen.insert(participant.as_str()) {
            return Err(format!(
                "Chat {} lists participant {} more than once",
                chat.id, participant
            ));
        }
    }

    match chat.chat_type {
        ChatType::Individual => {
            if chat.participants.len() != 2 {
                return Err(format!(
                    "Individual chat {} must have exactly 2 participants, found {}",
                    chat.id,
                    chat.participants.len()
                ));
            }
        }
        ChatType::Group => {
            let group = chat
                .group
                .as_ref()
                .ok_or_else(|| format!("Group chat {} has no group metadata", chat.id))?;
            if !chat.is_participant(&group.created_by) {
                return Err(format!(
                    "Creator {} of group {} is not a member",
                    group.created_by, chat.id
                ));
            }
            if let Some(admin) = group.admins.iter().find(|a| !chat.is_participant(a)) {
                return Err(format!(
                    "Admin {} of group {} is not a member",
                    admin, chat.id
                ));
            }
        }
    }

    for (key, message) in &chat.messages {
        if message.id != *key {
            return Err(format!(
                "Message key {} in chat {} does not match message id {}",
                key, chat.id, message.id
            ));
        }
        if message.chat_id != chat.id {
            return Err(format!(
                "Message {} in chat {} points at chat {}",
                key, chat.id, message.chat_id
            ));
        }
    }

    Ok(())
}

/// Validate that every chat summary of a user belongs to a chat they are in
pub fn validate_user<'a>(
    user: &User,
    find_chat: impl Fn(&str) -> Option<&'a Chat>,
) -> Result<(), String> {
    if user.id.is_empty() {
        return Err("User id cannot be empty".to_string());
    }
    for chat_id in user.chat_user.keys() {
        match find_chat(chat_id) {
            Some(chat) if chat.is_participant(&user.id) => {}
            Some(_) => {
                return Err(format!(
                    "User {} has a summary for chat {} without being a participant",
                    user.id, chat_id
                ))
            }
            None => {
                return Err(format!(
                    "User {} has a summary for unknown chat {}",
                    user.id, chat_id
                ))
            }
        }
    }
    Ok(())
}

/// True when messages are in non-decreasing timestamp order as stored
pub fn is_chronological(chat: &Chat) -> bool {
    chat.messages
        .values()
        .zip(chat.messages.values().skip(1))
        .all(|(a, b)| a.timestamp <= b.timestamp)
}
