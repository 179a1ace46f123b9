//! Read-only projection of the engine for the player bar.

use crate::{format_duration, PlayState, PlaybackEngine, Track};

/// Progress through the track as a percentage in `[0, 100]`.
pub fn progress_percent(position: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || !position.is_finite() {
        return 0.0;
    }
    (position / duration * 100.0).clamp(0.0, 100.0)
}

/// Borrowing façade over a [`PlaybackEngine`].
///
/// Every value is derived from the engine on demand; operations pass
/// straight through.
#[derive(Debug)]
pub struct MusicPlayer<'a> {
    engine: &'a mut PlaybackEngine,
}

impl<'a> MusicPlayer<'a> {
    pub fn new(engine: &'a mut PlaybackEngine) -> Self {
        Self { engine }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.engine.session().active_track.as_ref()
    }

    pub fn tracks(&self) -> &[Track] {
        self.engine.tracks()
    }

    pub fn play_state(&self) -> PlayState {
        self.engine.session().play_state
    }

    pub fn is_playing(&self) -> bool {
        self.play_state() == PlayState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.play_state() == PlayState::Loading
    }

    /// Skip buttons only make sense with somewhere else to go.
    pub fn has_multiple_tracks(&self) -> bool {
        self.engine.tracks().len() > 1
    }

    /// Whether the play/pause button should be enabled.
    pub fn can_toggle(&self) -> bool {
        !self.is_loading() && self.current_track().is_some()
    }

    pub fn progress_percent(&self) -> f64 {
        let session = self.engine.session();
        progress_percent(session.position_seconds, session.duration_seconds)
    }

    pub fn formatted_current_time(&self) -> String {
        format_duration(self.engine.session().position_seconds)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.engine.session().duration_seconds)
    }

    pub fn volume(&self) -> u8 {
        self.engine.session().volume_percent
    }

    pub fn is_muted(&self) -> bool {
        self.engine.is_muted()
    }

    pub fn frequency_data(&mut self) -> Vec<u8> {
        self.engine.frequency_data()
    }

    pub fn play_track_by_index(&mut self, index: usize) {
        self.engine.play_track_by_index(index);
    }

    pub fn toggle_play_pause(&mut self) {
        self.engine.toggle_play_pause();
    }

    pub fn skip_to_next(&mut self) {
        self.engine.skip_to_next();
    }

    pub fn skip_to_previous(&mut self) {
        self.engine.skip_to_previous();
    }

    pub fn seek_to(&mut self, seconds: f64) {
        self.engine.seek_to(seconds);
    }

    /// Seeks to a fraction of the track, as a click on the progress bar does.
    pub fn seek_to_percent(&mut self, percent: f64) {
        let duration = self.engine.session().duration_seconds;
        self.engine.seek_to(percent.clamp(0.0, 100.0) / 100.0 * duration);
    }

    pub fn set_volume(&mut self, value: f64) -> u8 {
        self.engine.set_volume(value)
    }

    pub fn nudge_volume(&mut self, steps: i32) -> u8 {
        self.engine.nudge_volume(steps)
    }

    pub fn toggle_mute(&mut self) -> u8 {
        self.engine.toggle_mute()
    }
}
