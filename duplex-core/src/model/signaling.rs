use crate::model::call::ShareMode;
use crate::model::peer::{PeerId, PeerIdentity};
use serde::{Deserialize, Serialize};

/// STUN/TURN endpoint handed to the negotiation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Network path proposal in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Named messages exchanged with the relay.
///
/// Unicast messages carry `peer_id`: the target when sent, the sender once the
/// relay delivers them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RelayMessage {
    #[serde(rename = "user:new")]
    UserNew(PeerIdentity),

    #[serde(rename = "user:available")]
    UserAvailable(PeerIdentity),

    /// Carries either the peer id or its display name.
    #[serde(rename = "user:unavailable")]
    UserUnavailable(String),

    /// Carries the display name.
    #[serde(rename = "user:deleted")]
    UserDeleted(String),

    #[serde(rename = "offer")]
    Offer {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        sdp: String,
        #[serde(rename = "shareMode")]
        share_mode: ShareMode,
    },

    #[serde(rename = "answer")]
    Answer {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        sdp: String,
    },

    #[serde(rename = "new-ice-candidate")]
    IceCandidate(IceCandidate),

    #[serde(rename = "connect:reject")]
    Reject(PeerId),

    /// Free-form notice from the relay itself.
    #[serde(rename = "message")]
    Notice(String),
}

impl RelayMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            RelayMessage::UserNew(_) => "user:new",
            RelayMessage::UserAvailable(_) => "user:available",
            RelayMessage::UserUnavailable(_) => "user:unavailable",
            RelayMessage::UserDeleted(_) => "user:deleted",
            RelayMessage::Offer { .. } => "offer",
            RelayMessage::Answer { .. } => "answer",
            RelayMessage::IceCandidate(_) => "new-ice-candidate",
            RelayMessage::Reject(_) => "connect:reject",
            RelayMessage::Notice(_) => "message",
        }
    }
}
