use duplex_core::{CallState, PeerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    /// The operation's precondition does not hold; nothing changed.
    #[error("{operation} ignored: {reason}")]
    InvalidTransition {
        operation: &'static str,
        reason: String,
    },

    #[error("media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("negotiation failed: {0}")]
    NegotiationFailure(#[source] anyhow::Error),

    #[error("chat channel is not open")]
    ChannelNotOpen,

    #[error("peer {0} rejected the call")]
    RemoteRejected(PeerId),

    #[error("peer {0} is no longer reachable")]
    RemoteUnavailable(PeerId),

    /// A concurrent transition invalidated the call attempt while this
    /// operation was suspended; its effect was discarded.
    #[error("call attempt superseded")]
    Superseded,

    #[error("no sender is carrying video on this call")]
    NoVideoSender,
}

impl CallError {
    pub(crate) fn invalid(operation: &'static str, state: CallState) -> Self {
        CallError::InvalidTransition {
            operation,
            reason: format!("not valid while {state}"),
        }
    }

    pub(crate) fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        CallError::InvalidTransition {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether the error ends the current call attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CallError::MediaUnavailable(_) | CallError::NegotiationFailure(_)
        )
    }
}

impl From<anyhow::Error> for CallError {
    fn from(err: anyhow::Error) -> Self {
        CallError::NegotiationFailure(err)
    }
}
