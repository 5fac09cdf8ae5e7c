use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat line, as carried over the data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "userName")]
    pub sender_name: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "createdAt")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender_name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}
