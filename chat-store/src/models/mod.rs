mod chat;
pub mod input;
mod message;
mod user;

pub use chat::{Chat, ChatType, ChatView, FriendView, GroupInfo, MemberView};
pub use message::Message;
pub use user::{ChatSummary, Friendship, User, UserStatus};
