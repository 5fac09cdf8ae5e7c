use async_trait::async_trait;
use duplex::client::{CaptureDevice, CaptureError, MediaConstraints, MediaStream, MediaTrack, TrackKind};

/// Capture backend for a headless terminal: live tracks that carry no
/// samples, so negotiation still advertises the requested media.
pub struct SilentCapture;

#[async_trait]
impl CaptureDevice for SilentCapture {
    async fn user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, CaptureError> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, "silent microphone"));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(TrackKind::Video, "blank camera"));
        }
        if tracks.is_empty() {
            return Err(CaptureError::Failed("nothing requested".to_owned()));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn display_media(
        &self,
        _constraints: MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        Ok(MediaStream::new(vec![MediaTrack::new(
            TrackKind::Video,
            "blank screen",
        )]))
    }
}
