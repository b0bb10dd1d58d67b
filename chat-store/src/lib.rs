//! In-memory chat data store.
//!
//! A [`ChatStore`] owns users, chats and messages loaded from a JSON
//! [`Fixture`] and keeps each participant's chat summary in step with the
//! chat's message log.

mod error;
mod fixture;
pub mod models;
mod store;
mod utils;

pub use error::{Result, StoreError};
pub use fixture::{Fixture, SEED_FIXTURE};
pub use store::{ChatStore, UNKNOWN_USERNAME};
