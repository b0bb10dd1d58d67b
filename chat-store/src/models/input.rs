//! Input DTOs with garde validation.
//!
//! Callers that receive ids and message text from clients validate them
//! here before touching the store.

use garde::Validate;
use serde::Deserialize;

use crate::error::StoreError;

/// Validation constants
pub const MAX_USER_ID_LENGTH: usize = 128;
pub const MAX_CHAT_ID_LENGTH: usize = 256;
pub const MAX_MESSAGE_LENGTH: usize = 10000;

/// Rejects text made only of whitespace
fn validate_not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Message cannot be blank"));
    }
    Ok(())
}

/// Input for sending a message; the sender comes from the caller's identity
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct SendMessageInput {
    #[garde(length(min = 1, max = MAX_CHAT_ID_LENGTH))]
    pub chat_id: String,
    #[garde(length(min = 1, max = MAX_MESSAGE_LENGTH), custom(validate_not_blank))]
    pub content: String,
}

/// Input for any request addressing a single chat
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct ChatIdInput {
    #[garde(length(min = 1, max = MAX_CHAT_ID_LENGTH))]
    pub chat_id: String,
}

/// Input for any request addressing a single user
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct UserIdInput {
    #[garde(length(min = 1, max = MAX_USER_ID_LENGTH))]
    pub user_id: String,
}

/// Helper trait to convert garde validation errors into store errors
pub trait ValidateExt {
    fn validate_input(&self) -> Result<(), StoreError>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> Result<(), StoreError> {
        self.validate()
            .map_err(|e| StoreError::InvalidInput(e.to_string()))
    }
}
