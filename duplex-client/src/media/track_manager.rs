use crate::error::CallError;
use crate::media::{CaptureDevice, MediaConstraints, MediaStream, MediaTrack};
use crate::transport::{PeerTransport, SenderId, TrackKind};
use duplex_core::ShareMode;
use std::sync::Arc;
use tracing::{debug, info};

/// Acquires local capture per share mode and wires tracks into a connection.
#[derive(Clone)]
pub struct MediaTrackManager {
    device: Arc<dyn CaptureDevice>,
}

impl MediaTrackManager {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self { device }
    }

    pub async fn acquire(&self, share_mode: ShareMode) -> Result<MediaStream, CallError> {
        let stream = match share_mode {
            ShareMode::AudioOnly => self.device.user_media(MediaConstraints::AUDIO).await,
            ShareMode::WithCamera => self.device.user_media(MediaConstraints::AUDIO_VIDEO).await,
            ShareMode::WithDisplay => return self.acquire_display_with_microphone().await,
        }
        .map_err(|e| CallError::MediaUnavailable(e.to_string()))?;

        info!(
            "Acquired {:?} stream {} with {} track(s)",
            share_mode,
            stream.id,
            stream.tracks().len()
        );
        Ok(stream)
    }

    /// Screen video plus microphone audio, merged into one stream holding
    /// exactly one track of each kind.
    async fn acquire_display_with_microphone(&self) -> Result<MediaStream, CallError> {
        let display = self
            .device
            .display_media(MediaConstraints {
                audio: false,
                video: true,
            })
            .await
            .map_err(|e| CallError::MediaUnavailable(e.to_string()))?;

        let microphone = match self.device.user_media(MediaConstraints::AUDIO).await {
            Ok(stream) => stream,
            Err(e) => {
                display.stop();
                return Err(CallError::MediaUnavailable(e.to_string()));
            }
        };

        let video = display.video_tracks().next().cloned();
        let audio = microphone.audio_tracks().next().cloned();
        let (Some(video), Some(audio)) = (video, audio) else {
            display.stop();
            microphone.stop();
            return Err(CallError::MediaUnavailable(
                "display capture needs one video and one audio track".to_owned(),
            ));
        };

        // Anything beyond the two kept tracks would keep a device busy.
        for track in display.tracks().iter().chain(microphone.tracks()) {
            if track.id != video.id && track.id != audio.id {
                track.stop();
            }
        }

        Ok(MediaStream::new(vec![video, audio]))
    }

    /// Screen capture used to swap into a running call.
    pub async fn acquire_display_track(&self) -> Result<MediaTrack, CallError> {
        let display = self
            .device
            .display_media(MediaConstraints {
                audio: false,
                video: true,
            })
            .await
            .map_err(|e| CallError::MediaUnavailable(e.to_string()))?;

        let Some(video) = display.video_tracks().next().cloned() else {
            display.stop();
            return Err(CallError::MediaUnavailable(
                "display capture returned no video".to_owned(),
            ));
        };
        for track in display.tracks() {
            if track.id != video.id {
                track.stop();
            }
        }
        Ok(video)
    }

    /// Adds every track of `stream` as its own sender.
    pub async fn attach(
        &self,
        stream: &MediaStream,
        transport: &dyn PeerTransport,
    ) -> Result<Vec<SenderId>, CallError> {
        let mut senders = Vec::with_capacity(stream.tracks().len());
        for track in stream.tracks() {
            let sender = transport
                .add_track(track, &stream.id)
                .await
                .map_err(CallError::NegotiationFailure)?;
            debug!("Attached {:?} track {} as sender {:?}", track.kind, track.id, sender);
            senders.push(sender);
        }
        Ok(senders)
    }

    /// Puts `track` on the sender currently carrying video.
    pub async fn replace_video_track(
        &self,
        transport: &dyn PeerTransport,
        track: &MediaTrack,
    ) -> Result<SenderId, CallError> {
        let sender = transport
            .senders()
            .await
            .into_iter()
            .find(|s| s.kind == Some(TrackKind::Video))
            .ok_or(CallError::NoVideoSender)?;

        transport
            .replace_track(&sender.id, track)
            .await
            .map_err(CallError::NegotiationFailure)?;
        info!("Replaced video on sender {:?} with track {}", sender.id, track.id);
        Ok(sender.id)
    }
}
