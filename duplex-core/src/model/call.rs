use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible state of the local call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Waiting,
    Outgoing,
    Incoming,
    Active,
}

impl CallState {
    /// Availability this client reports to the relay while in this state.
    pub fn availability(self) -> crate::Availability {
        match self {
            CallState::Waiting => crate::Availability::Available,
            _ => crate::Availability::Unavailable,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Waiting => "WAITING",
            CallState::Outgoing => "OUTGOING",
            CallState::Incoming => "INCOMING",
            CallState::Active => "ACTIVE",
        };
        f.write_str(name)
    }
}

/// What the caller shares besides the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareMode {
    AudioOnly,
    WithCamera,
    WithDisplay,
}

impl std::str::FromStr for ShareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" | "audio_only" => Ok(ShareMode::AudioOnly),
            "camera" | "with_camera" => Ok(ShareMode::WithCamera),
            "display" | "screen" | "with_display" => Ok(ShareMode::WithDisplay),
            other => Err(format!("unknown share mode '{other}'")),
        }
    }
}
