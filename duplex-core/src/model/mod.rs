mod call;
mod chat;
mod peer;
mod signaling;

pub use call::{CallState, ShareMode};
pub use chat::ChatMessage;
pub use peer::{Availability, PeerId, PeerIdentity, PresenceEntry};
pub use signaling::{IceCandidate, IceServerConfig, RelayMessage, SdpKind};
