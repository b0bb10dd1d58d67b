mod helpers;
pub mod validation;

pub use helpers::{generate_message_id, next_timestamp};
