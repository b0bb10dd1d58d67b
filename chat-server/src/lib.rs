//! Chat Store WebSocket Server Library
//!
//! This module exposes the server components for use in integration tests.

pub mod config;
mod connection;
mod messages;
mod state;

pub use config::ServerConfig;
pub use connection::handle_connection;
pub use connection::handle_message;
pub use messages::WsMessage;
pub use state::{ServerState, DEFAULT_MAX_PENDING_MESSAGES};
