use crate::media::MediaTrack;
use crate::transport::{RemoteTrack, TrackKind, TransportConfig, TransportState};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use duplex_core::{IceCandidate, SdpKind};
use std::sync::Arc;

/// Handle of one outgoing media sender on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInfo {
    pub id: SenderId,
    /// Kind of the track the sender currently carries.
    pub kind: Option<TrackKind>,
}

/// Callbacks from the negotiation engine. A transport calls these only
/// between [`PeerTransport::bind`] and [`PeerTransport::unbind`].
pub trait TransportHandler: Send + Sync {
    fn on_ice_candidate(&self, candidate: IceCandidate);

    fn on_ice_candidate_error(&self, error: String);

    fn on_connection_state_change(&self, state: TransportState);

    fn on_data_channel(&self, channel: Arc<dyn DataChannel>);

    fn on_channel_open(&self, label: String);

    fn on_channel_message(&self, data: Bytes);

    fn on_channel_close(&self, label: String);

    fn on_remote_track(&self, track: RemoteTrack);
}

/// Reliable ordered message channel carried by a connection.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    fn is_open(&self) -> bool;

    async fn send_text(&self, text: String) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// One peer connection of the negotiation engine.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    fn bind(&self, handler: Arc<dyn TransportHandler>);

    /// After this returns no handler method is invoked again.
    fn unbind(&self);

    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_track(&self, track: &MediaTrack, stream_id: &str) -> Result<SenderId>;

    async fn senders(&self) -> Vec<SenderInfo>;

    /// Swaps the sender's track in place; no renegotiation follows.
    async fn replace_track(&self, sender: &SenderId, track: &MediaTrack) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>>;

    async fn close(&self) -> Result<()>;
}

/// Builds a fresh transport for each call attempt.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, config: &TransportConfig) -> Result<Arc<dyn PeerTransport>>;
}
