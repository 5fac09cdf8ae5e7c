use async_trait::async_trait;
use duplex_core::{IceCandidate, PeerId, PeerIdentity, ShareMode};

/// Outbound half of the relay: one method per named message. Implementations
/// carry no call logic; delivery failures are logged, not returned.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// `user:available` for this client.
    async fn announce_available(&self, identity: PeerIdentity);

    /// `user:unavailable` for this client.
    async fn announce_unavailable(&self, id: PeerId);

    /// `user:deleted`, sent when this client drops a display name.
    async fn announce_deleted(&self, name: String);

    async fn send_offer(&self, target: PeerId, sdp: String, share_mode: ShareMode);

    async fn send_answer(&self, target: PeerId, sdp: String);

    /// Trickled local candidate; the relay routes it to the current peer.
    async fn send_ice(&self, candidate: IceCandidate);

    async fn send_reject(&self, target: PeerId);
}
