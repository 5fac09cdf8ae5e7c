use crate::error::CallError;
use crate::transport::DataChannel;
use anyhow::Context;
use duplex_core::ChatMessage;
use std::sync::Arc;
use tracing::debug;

/// JSON framing of chat lines over the call's data channel.
pub struct Messenger;

impl Messenger {
    pub fn encode(message: &ChatMessage) -> Result<String, CallError> {
        serde_json::to_string(message)
            .context("encode chat message")
            .map_err(CallError::NegotiationFailure)
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<ChatMessage> {
        serde_json::from_slice(data).context("malformed chat frame")
    }

    /// Writes `message` to `channel`. Fails with [`CallError::ChannelNotOpen`]
    /// unless the channel exists and is open.
    pub async fn send(
        channel: Option<Arc<dyn DataChannel>>,
        message: &ChatMessage,
    ) -> Result<(), CallError> {
        let channel = channel
            .filter(|c| c.is_open())
            .ok_or(CallError::ChannelNotOpen)?;

        let payload = Self::encode(message)?;
        debug!("Chat -> '{}' ({} bytes)", channel.label(), payload.len());
        channel
            .send_text(payload)
            .await
            .map_err(CallError::NegotiationFailure)
    }
}
