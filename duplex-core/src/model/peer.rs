use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Relay-assigned identifier of a reachable peer.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub id: PeerId,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl PeerIdentity {
    pub fn new(id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Available,
    Unavailable,
}

/// One row of the presence directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub identity: PeerIdentity,
    pub availability: Availability,
}

impl PresenceEntry {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}
