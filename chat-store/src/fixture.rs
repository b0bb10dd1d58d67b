//! Fixture loading and export.
//!
//! A fixture is a single JSON document with top-level `users` and `chats`
//! maps. It is the whole backing data of a store.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::models::{Chat, User};
use crate::utils::validation::{is_chronological, validate_chat, validate_user};

/// Seed dataset bundled with the crate.
pub const SEED_FIXTURE: &str = include_str!("../fixtures/seed.json");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Fixture {
    #[serde(default)]
    pub users: IndexMap<String, User>,
    #[serde(default)]
    pub chats: IndexMap<String, Chat>,
}

impl Fixture {
    /// Parse, normalize and validate a fixture document.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        fixture.prepare()
    }

    /// Read a fixture document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let fixture = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            users = fixture.users.len(),
            chats = fixture.chats.len(),
            "Loaded fixture"
        );
        Ok(fixture)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fill ids that the document leaves implicit in map keys, then check
    /// every model invariant.
    pub(crate) fn prepare(mut self) -> Result<Self> {
        for (key, user) in self.users.iter_mut() {
            fill_id(&mut user.id, key, "user")?;
        }
        for (key, chat) in self.chats.iter_mut() {
            fill_id(&mut chat.id, key, "chat")?;
            for (message_key, message) in chat.messages.iter_mut() {
                fill_id(&mut message.id, message_key, "message")?;
                if message.chat_id.is_empty() {
                    message.chat_id = key.clone();
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for chat in self.chats.values() {
            validate_chat(chat).map_err(StoreError::InvalidFixture)?;
            if !is_chronological(chat) {
                warn!(chat_id = %chat.id, "Stored messages are not in timestamp order");
            }
        }
        for user in self.users.values() {
            validate_user(user, |id| self.chats.get(id)).map_err(StoreError::InvalidFixture)?;
        }
        Ok(())
    }
}

fn fill_id(id: &mut String, key: &str, kind: &str) -> Result<()> {
    if id.is_empty() {
        *id = key.to_string();
        Ok(())
    } else if id != key {
        Err(StoreError::InvalidFixture(format!(
            "{} stored under key {} has id {}",
            kind, key, id
        )))
    } else {
        Ok(())
    }
}
