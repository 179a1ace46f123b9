use serde::{Deserialize, Serialize};

use crate::Track;

/// Where the shared player is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlayState {
    /// A buffer is decoded and attached to the output.
    pub fn has_track(self) -> bool {
        matches!(self, PlayState::Playing | PlayState::Paused)
    }
}

/// The single live playback state owned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub tracks: Vec<Track>,
    /// Index of the track most recently requested, set as soon as its load
    /// starts so rapid skips keep advancing. Follows that track by id when
    /// the list is replaced, and is `None` once the list no longer holds it.
    pub active_index: Option<usize>,
    /// Copy of the track that is actually decoded and attached.
    pub active_track: Option<Track>,
    pub play_state: PlayState,
    pub volume_percent: u8,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub load_generation: u64,
}

impl PlaybackSession {
    pub(crate) fn new(volume_percent: u8, load_generation: u64) -> Self {
        Self {
            tracks: Vec::new(),
            active_index: None,
            active_track: None,
            play_state: PlayState::Idle,
            volume_percent,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            load_generation,
        }
    }

    pub fn snapshot(&self, muted: bool) -> PlaybackSnapshot {
        PlaybackSnapshot {
            play_state: self.play_state,
            active_track: self.active_track.clone(),
            position_seconds: self.position_seconds,
            duration_seconds: self.duration_seconds,
            volume_percent: self.volume_percent,
            track_count: self.tracks.len(),
            muted,
        }
    }
}

/// What the UI reads on every render tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub play_state: PlayState,
    pub active_track: Option<Track>,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub volume_percent: u8,
    pub track_count: usize,
    pub muted: bool,
}

/// How a finished load was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The load was current and its track is now playing.
    Applied { generation: u64, track_id: String },
    /// A newer request superseded this load; nothing changed.
    Stale { generation: u64 },
    /// The load was current but decoding or starting the output failed.
    Failed { generation: u64, track_id: String },
}
