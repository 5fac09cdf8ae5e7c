use crate::media::MediaStream;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub const AUDIO: MediaConstraints = MediaConstraints {
        audio: true,
        video: false,
    };

    pub const AUDIO_VIDEO: MediaConstraints = MediaConstraints {
        audio: true,
        video: true,
    };
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("permission denied for {0}")]
    PermissionDenied(&'static str),

    #[error("no {0} device")]
    NotFound(&'static str),

    #[error("capture failed: {0}")]
    Failed(String),
}

/// Platform capture backend (microphone, camera, screen).
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Microphone and/or camera capture.
    async fn user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, CaptureError>;

    /// Screen or window capture.
    async fn display_media(&self, constraints: MediaConstraints)
    -> Result<MediaStream, CaptureError>;
}
