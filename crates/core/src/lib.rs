//! Core library for the Rhythm Player front end.
//!
//! The crate owns the one subsystem of the menu UI with real design
//! pressure: the shared audio player. A single [`PlaybackEngine`] loads,
//! loops, previews and hands off between tracks while staying responsive to
//! rapid input, and exposes live progress plus frequency data for the
//! visualiser. Decoding, the audio device and settings storage are reached
//! through the seams in [`audio`] and [`storage`], so hosts bring their own
//! platform pieces.

pub mod analysis;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod player;
pub mod storage;
pub mod timeline;
pub mod volume;

pub use analysis::{normalize_decibels, SpectrumAnalyser};
pub use audio::{AudioOutput, DecodedAudio, OutputDevice, TrackLoader};
pub use catalog::{Track, TrackList};
pub use config::{AnalyserConfig, PlayerConfig, VolumeCurve};
pub use engine::{
    Collaborators, LoadOutcome, PlayState, PlaybackEngine, PlaybackSession, PlaybackSnapshot,
};
pub use error::{PlayerError, Result};
pub use format::format_duration;
pub use player::{progress_percent, MusicPlayer};
pub use storage::{JsonFileStorage, MemoryStorage, VolumeStorage};
pub use timeline::{Clock, ManualClock, ProgressTicker, SystemClock};
pub use volume::{Gain, VolumeStore};
