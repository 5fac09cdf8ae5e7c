use crate::transport::TrackKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// A local capture track. Clones share the live flag, so stopping any clone
/// stops the track for every holder.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct MediaStream {
    pub id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    /// Replaces the first video track, returning the one it displaced.
    pub fn swap_video_track(&mut self, track: MediaTrack) -> Option<MediaTrack> {
        match self.tracks.iter().position(|t| t.kind == TrackKind::Video) {
            Some(index) => Some(std::mem::replace(&mut self.tracks[index], track)),
            None => {
                self.tracks.push(track);
                None
            }
        }
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
