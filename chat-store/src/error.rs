//! Error types for the store.

use thiserror::Error;

/// Errors surfaced by [`crate::ChatStore`] and fixture loading.
///
/// Missing users, chats and messages on read paths are not errors; those
/// calls return `None` or an empty list.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A write targeted a chat that does not exist
    #[error("chat does not exist: {0}")]
    UnknownChat(String),

    /// Fixture data breaks a model invariant
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),

    /// Request input failed validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, StoreError>;
