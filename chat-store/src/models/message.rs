use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Filled from the message map key when absent in the fixture.
    #[serde(default)]
    pub id: String,
    /// Filled from the owning chat when absent in the fixture.
    #[serde(default)]
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}
