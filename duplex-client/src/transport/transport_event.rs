use crate::transport::DataChannel;
use bytes::Bytes;
use duplex_core::IceCandidate;
use std::fmt;
use std::sync::Arc;

/// Identifies one call attempt. Every connection, and every event it emits,
/// is tagged with the attempt that created it so stale events can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection state as reported by the negotiation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// Disconnected is treated as terminal, the same as failed and closed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Media arriving from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
}

/// Events the transport produces for the call controller.
pub enum TransportEvent {
    /// Local candidate to trickle to the peer.
    CandidateGenerated(AttemptId, IceCandidate),

    /// Local candidate gathering hit an error; non-fatal.
    CandidateError(AttemptId, String),

    StateChanged(AttemptId, TransportState),

    /// The remote side opened a data channel towards us.
    DataChannelReceived(AttemptId, Arc<dyn DataChannel>),

    /// A data channel (local or remote) is ready for writing.
    ChannelOpen(AttemptId, String),

    ChannelMessage(AttemptId, Bytes),

    ChannelClosed(AttemptId, String),

    RemoteTrackAdded(AttemptId, RemoteTrack),
}

impl TransportEvent {
    pub fn attempt(&self) -> AttemptId {
        match self {
            TransportEvent::CandidateGenerated(attempt, _)
            | TransportEvent::CandidateError(attempt, _)
            | TransportEvent::StateChanged(attempt, _)
            | TransportEvent::DataChannelReceived(attempt, _)
            | TransportEvent::ChannelOpen(attempt, _)
            | TransportEvent::ChannelMessage(attempt, _)
            | TransportEvent::ChannelClosed(attempt, _)
            | TransportEvent::RemoteTrackAdded(attempt, _) => *attempt,
        }
    }
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::CandidateGenerated(a, c) => {
                write!(f, "CandidateGenerated({a}, {})", c.candidate)
            }
            TransportEvent::CandidateError(a, e) => write!(f, "CandidateError({a}, {e})"),
            TransportEvent::StateChanged(a, s) => write!(f, "StateChanged({a}, {s:?})"),
            TransportEvent::DataChannelReceived(a, dc) => {
                write!(f, "DataChannelReceived({a}, {})", dc.label())
            }
            TransportEvent::ChannelOpen(a, label) => write!(f, "ChannelOpen({a}, {label})"),
            TransportEvent::ChannelMessage(a, data) => {
                write!(f, "ChannelMessage({a}, {} bytes)", data.len())
            }
            TransportEvent::ChannelClosed(a, label) => write!(f, "ChannelClosed({a}, {label})"),
            TransportEvent::RemoteTrackAdded(a, t) => {
                write!(f, "RemoteTrackAdded({a}, {:?} {})", t.kind, t.id)
            }
        }
    }
}
