//! Server settings read from the environment.

use std::path::PathBuf;

use tracing::warn;

use crate::state::DEFAULT_MAX_PENDING_MESSAGES;

pub const DEFAULT_ADDR: &str = "0.0.0.0:9001";

pub const ADDR_VAR: &str = "CHAT_SERVER_ADDR";
pub const FIXTURE_PATH_VAR: &str = "CHAT_FIXTURE_PATH";
pub const MAX_PENDING_VAR: &str = "CHAT_MAX_PENDING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    /// Fixture to load; the bundled seed fixture is used when unset
    pub fixture_path: Option<PathBuf>,
    pub max_pending: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            fixture_path: None,
            max_pending: DEFAULT_MAX_PENDING_MESSAGES,
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for missing
    /// or unusable values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let addr = lookup(ADDR_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.addr);

        let fixture_path = lookup(FIXTURE_PATH_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let max_pending = match lookup(MAX_PENDING_VAR) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(
                        "Ignoring {}={:?}, using default {}",
                        MAX_PENDING_VAR, raw, defaults.max_pending
                    );
                    defaults.max_pending
                }
            },
            None => defaults.max_pending,
        };

        Self {
            addr,
            fixture_path,
            max_pending,
        }
    }
}
