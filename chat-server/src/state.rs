use std::collections::VecDeque;
use std::sync::Arc;

use chat_store::ChatStore;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Pushes held per offline user before the oldest is dropped
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 1000;

/// The shared store, the open connections and the pushes held for offline users
pub struct ServerState {
    store: Arc<ChatStore>,
    /// user id -> one channel per open connection
    pub clients: DashMap<String, Vec<mpsc::UnboundedSender<String>>>,
    /// user id -> serialized frames awaiting the next connect
    pending_messages: DashMap<String, VecDeque<String>>,
    max_pending: usize,
}

impl ServerState {
    pub fn new(store: Arc<ChatStore>) -> Self {
        Self::with_max_pending(store, DEFAULT_MAX_PENDING_MESSAGES)
    }

    pub fn with_max_pending(store: Arc<ChatStore>, max_pending: usize) -> Self {
        Self {
            store,
            clients: DashMap::new(),
            pending_messages: DashMap::new(),
            max_pending: max_pending.max(1),
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Register one more connection for a user
    pub fn add_client(&self, user_id: String, tx: mpsc::UnboundedSender<String>) {
        self.clients.entry(user_id).or_default().push(tx);
    }

    /// Forget closed connections of a user; true once the user has none open
    pub fn remove_client(&self, user_id: &str) -> bool {
        let Some(mut channels) = self.clients.get_mut(user_id) else {
            return true;
        };
        channels.retain(|tx| !tx.is_closed());
        if !channels.is_empty() {
            return false;
        }
        drop(channels);
        self.clients.remove(user_id);
        true
    }

    /// Push a frame to every connected user except `skip`
    pub fn broadcast(&self, frame: &str, skip: Option<&str>) {
        self.clients
            .iter()
            .filter(|entry| skip != Some(entry.key().as_str()))
            .for_each(|entry| {
                deliver(entry.value(), frame);
            });
    }

    /// Push a frame to all open connections of a user
    pub fn send_to_user(&self, user_id: &str, frame: &str) -> bool {
        self.clients
            .get(user_id)
            .map(|channels| deliver(&channels, frame))
            .unwrap_or(false)
    }

    /// Ids of users with at least one open connection
    pub fn online_users(&self) -> Vec<String> {
        self.clients
            .iter()
            .filter_map(|entry| (!entry.value().is_empty()).then(|| entry.key().clone()))
            .collect()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.clients
            .get(user_id)
            .is_some_and(|channels| !channels.is_empty())
    }

    /// Hold a frame for an offline user; the oldest one goes once the queue is full
    pub fn queue_message(&self, user_id: &str, frame: String) {
        let mut queue = self
            .pending_messages
            .entry(user_id.to_string())
            .or_default();

        if queue.len() >= self.max_pending {
            queue.pop_front();
            info!(user_id = %user_id, "Pending queue full, dropped oldest push");
        }
        queue.push_back(frame);
    }

    /// Drain the frames held for a user, oldest first
    pub fn take_pending_messages(&self, user_id: &str) -> Vec<String> {
        self.pending_messages
            .remove(user_id)
            .map(|(_, queue)| queue.into())
            .unwrap_or_default()
    }

    /// Deliver to an online user or hold for later; true if delivered now
    pub fn send_or_queue(&self, user_id: &str, frame: &str) -> bool {
        let delivered = self.send_to_user(user_id, frame);
        if !delivered {
            debug!(user_id = %user_id, "User offline, queued push");
            self.queue_message(user_id, frame.to_string());
        }
        delivered
    }

    pub fn pending_count(&self, user_id: &str) -> usize {
        self.pending_messages
            .get(user_id)
            .map_or(0, |queue| queue.len())
    }
}

/// Send a frame on each channel; true if any accepted it
fn deliver(channels: &[mpsc::UnboundedSender<String>], frame: &str) -> bool {
    channels
        .iter()
        .fold(false, |sent, tx| tx.send(frame.to_string()).is_ok() || sent)
}
