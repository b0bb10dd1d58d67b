use chat_store::models::{Chat, ChatView, FriendView, MemberView, Message, User};
use serde::{Deserialize, Serialize};

/// WebSocket frames exchanged with chat clients.
///
/// Requests carry no sender or current-user field: the server always acts
/// as the user the connection authenticated as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    // Client -> server
    Connect {
        user_id: String,
    },
    GetCurrentUser,
    GetUser {
        user_id: String,
    },
    GetChats,
    GetChat {
        chat_id: String,
    },
    GetMessages {
        chat_id: String,
    },
    SendMessage {
        chat_id: String,
        content: String,
    },
    MarkChatRead {
        chat_id: String,
    },
    GetFriends,
    GetChatMembers {
        chat_id: String,
    },

    // Server -> client
    AuthResponse {
        success: bool,
        message: String,
    },
    CurrentUser {
        user: Option<User>,
    },
    User {
        user_id: String,
        user: Option<User>,
    },
    Chats {
        chats: Vec<ChatView>,
    },
    Chat {
        chat_id: String,
        chat: Option<Chat>,
    },
    Messages {
        chat_id: String,
        messages: Vec<Message>,
    },
    MessageSent {
        message: Message,
    },
    NewMessage {
        message: Message,
    },
    ChatRead {
        chat_id: String,
        user_id: String,
        marked: usize,
    },
    Friends {
        friends: Vec<FriendView>,
    },
    ChatMembers {
        chat_id: String,
        members: Vec<MemberView>,
    },
    Presence {
        user_id: String,
        is_online: bool,
        last_seen: Option<i64>,
    },
    Error {
        message: String,
    },
}

impl WsMessage {
    pub fn error(message: impl Into<String>) -> Self {
        WsMessage::Error {
            message: message.into(),
        }
    }
}
