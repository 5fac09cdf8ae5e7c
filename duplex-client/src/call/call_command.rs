use duplex_core::{PeerId, ShareMode};

/// User intents fed into the call session.
#[derive(Debug, Clone, PartialEq)]
pub enum CallCommand {
    Place { target: PeerId, share_mode: ShareMode },

    Accept,

    Reject,

    HangUp,

    SendChat(String),

    /// Swap the outgoing video for a screen capture.
    ShareScreen,

    /// Announce (or change) the display name.
    Register(String),

    ClearChat,
}
