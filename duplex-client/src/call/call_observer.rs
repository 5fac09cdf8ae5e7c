use crate::error::CallError;
use crate::transport::{RemoteTrack, TransportState};
use duplex_core::{CallState, ChatMessage, PeerId, ShareMode};

/// Why a call went back to waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Local hangup.
    HungUp,

    /// The incoming call was declined locally.
    Declined,

    RemoteRejected,

    /// The caller withdrew before the call was answered.
    Cancelled,

    RemoteUnavailable,

    Terminated(TransportState),

    Failed(String),
}

/// User-visible events raised by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum CallNotice {
    IncomingCall { caller: PeerId, share_mode: ShareMode },

    Connected { peer: PeerId },

    Ended { peer: PeerId, reason: EndReason },

    /// Free-form notice pushed by the relay.
    Relay(String),
}

/// UI-facing hooks. Called synchronously from the controller with no
/// controller state borrowed, so implementations may query the controller.
pub trait CallObserver {
    fn on_state_change(&self, _from: CallState, _to: CallState) {}

    fn on_notice(&self, _notice: &CallNotice) {}

    fn on_chat_message(&self, _message: &ChatMessage) {}

    fn on_remote_track(&self, _track: &RemoteTrack) {}

    fn on_error(&self, _error: &CallError) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl CallObserver for NoopObserver {}
