//! The shared playback engine.
//!
//! One engine owns one output and one analysis tap. Loads are the only truly
//! asynchronous work: each request is tagged with a fresh generation, the
//! decode runs on the tokio runtime, and its completion travels back over a
//! channel. Completions are applied on the owner's thread by
//! [`PlaybackEngine::pump`] or [`PlaybackEngine::next_completion`], and only
//! if their generation is still the latest, so the last request always wins
//! no matter which decode finishes first.

mod session;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::{
    AudioOutput, Clock, DecodedAudio, OutputDevice, PlayerConfig, ProgressTicker, Result,
    SpectrumAnalyser, Track, TrackLoader, VolumeStorage, VolumeStore,
};

pub use session::{LoadOutcome, PlayState, PlaybackSession, PlaybackSnapshot};

/// Platform pieces the engine drives.
pub struct Collaborators {
    pub device: Box<dyn OutputDevice>,
    pub loader: Arc<dyn TrackLoader>,
    pub storage: Arc<dyn VolumeStorage>,
    pub clock: Arc<dyn Clock>,
}

struct LoadCompletion {
    generation: u64,
    track: Track,
    result: Result<DecodedAudio>,
}

pub struct PlaybackEngine {
    config: PlayerConfig,
    device: Box<dyn OutputDevice>,
    loader: Arc<dyn TrackLoader>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    volume: VolumeStore,
    session: PlaybackSession,
    initialized: bool,
    output: Option<Box<dyn AudioOutput>>,
    analyser: Option<SpectrumAnalyser>,
    buffer: Option<DecodedAudio>,
    /// Track of the latest play request, loaded or not. `active_index`
    /// always points at it.
    requested: Option<Track>,
    ticker: Option<ProgressTicker>,
    completion_tx: mpsc::UnboundedSender<LoadCompletion>,
    completions: mpsc::UnboundedReceiver<LoadCompletion>,
    updates: watch::Sender<PlaybackSnapshot>,
}

impl PlaybackEngine {
    /// Builds an engine in its pre-initialisation shape. No device resources
    /// are touched until the first load.
    pub fn new(config: PlayerConfig, parts: Collaborators, runtime: Handle) -> Result<Self> {
        config.validate()?;

        let volume = VolumeStore::new(&config, parts.storage, &runtime);
        let session = PlaybackSession::new(volume.percent(), 0);
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (updates, _) = watch::channel(session.snapshot(false));

        Ok(Self {
            config,
            device: parts.device,
            loader: parts.loader,
            clock: parts.clock,
            runtime,
            volume,
            session,
            initialized: false,
            output: None,
            analyser: None,
            buffer: None,
            requested: None,
            ticker: None,
            completion_tx,
            completions,
            updates,
        })
    }

    /// Makes the engine usable and restores the persisted volume.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }

        self.initialized = true;
        self.session.volume_percent = self.volume.initialize();
        self.apply_gain();
        info!(volume = self.session.volume_percent, "playback engine initialised");
        self.publish();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn tracks(&self) -> &[Track] {
        &self.session.tracks
    }

    pub fn load_generation(&self) -> u64 {
        self.session.load_generation
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.session.snapshot(self.volume.is_muted())
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.updates.subscribe()
    }

    /// Replaces the track list wholesale. Playback and any load in flight
    /// are left alone; the active index follows the requested track by id,
    /// and is cleared when the new list no longer holds it.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.session.active_index = self
            .requested
            .as_ref()
            .and_then(|requested| tracks.iter().position(|track| track.id == requested.id));

        debug!(
            count = tracks.len(),
            active_index = ?self.session.active_index,
            "track list replaced"
        );
        self.session.tracks = tracks;
        self.publish();
    }

    /// Starts loading track `index`, or toggles play/pause when that track is
    /// already the one attached. Out-of-range indices are ignored.
    pub fn play_track_by_index(&mut self, index: usize) {
        if !self.initialized {
            warn!(index, "playback engine is not initialised; ignoring play request");
            return;
        }

        let Some(track) = self.session.tracks.get(index).cloned() else {
            debug!(
                index,
                track_count = self.session.tracks.len(),
                "ignoring out-of-range track index"
            );
            return;
        };

        let attached = self
            .session
            .active_track
            .as_ref()
            .is_some_and(|active| active.id == track.id);
        if attached && self.output.is_some() && self.session.play_state.has_track() {
            self.toggle_play_pause();
            return;
        }

        let loading = self
            .requested
            .as_ref()
            .is_some_and(|requested| requested.id == track.id);
        if loading && self.session.play_state == PlayState::Loading {
            debug!(index, track_id = %track.id, "track is already loading");
            self.session.active_index = Some(index);
            return;
        }

        let generation = self.next_generation();
        self.stop_output();
        self.buffer = None;
        if let Some(analyser) = self.analyser.as_mut() {
            analyser.detach();
        }
        self.session.active_index = Some(index);
        self.requested = Some(track.clone());
        self.session.play_state = PlayState::Loading;
        self.session.position_seconds = 0.0;
        self.session.duration_seconds = 0.0;

        if let Err(err) = self.ensure_output() {
            error!(%err, generation, "failed to open audio output");
            self.session.play_state = PlayState::Idle;
            self.session.active_track = None;
            self.publish();
            return;
        }

        info!(generation, index, track_id = %track.id, url = %track.audio_url, "loading track");
        let loader = Arc::clone(&self.loader);
        let completions = self.completion_tx.clone();
        self.runtime.spawn(async move {
            let result = loader.load(&track.audio_url).await;
            // The engine may have been dropped meanwhile; nothing to report to.
            let _ = completions.send(LoadCompletion {
                generation,
                track,
                result,
            });
        });

        self.publish();
    }

    /// Pauses at the exact current position, or resumes from it.
    pub fn toggle_play_pause(&mut self) {
        let (Some(output), Some(buffer)) = (self.output.as_mut(), self.buffer.as_ref()) else {
            return;
        };

        match self.session.play_state {
            PlayState::Playing => {
                let now = self.clock.now();
                let position = self
                    .ticker
                    .take()
                    .map(|ticker| ticker.position_at(now))
                    .unwrap_or(self.session.position_seconds);
                output.stop();
                self.session.position_seconds = position;
                self.session.play_state = PlayState::Paused;
                debug!(position, "paused");
            }
            PlayState::Paused => {
                let position = self.session.position_seconds;
                if let Err(err) = output.start(buffer, position, self.config.looped) {
                    error!(%err, position, "failed to resume playback");
                    return;
                }
                self.start_ticker(position);
                self.session.play_state = PlayState::Playing;
                debug!(position, "resumed");
            }
            PlayState::Idle | PlayState::Loading => return,
        }

        self.publish();
    }

    pub fn skip_to_next(&mut self) {
        let count = self.session.tracks.len();
        if count == 0 {
            return;
        }

        let next = match self.session.active_index {
            Some(index) => (index % count + 1) % count,
            None => 0,
        };
        self.play_track_by_index(next);
    }

    pub fn skip_to_previous(&mut self) {
        let count = self.session.tracks.len();
        if count == 0 {
            return;
        }

        let previous = match self.session.active_index {
            Some(index) => (index % count + count - 1) % count,
            None => count - 1,
        };
        self.play_track_by_index(previous);
    }

    /// Moves to `seconds`, clamped to the track. While paused only the stored
    /// position changes, so a later resume starts there.
    pub fn seek_to(&mut self, seconds: f64) {
        if seconds.is_nan() || !self.session.play_state.has_track() {
            return;
        }
        let (Some(output), Some(buffer)) = (self.output.as_mut(), self.buffer.as_ref()) else {
            return;
        };

        let target = seconds.clamp(0.0, self.session.duration_seconds);
        if self.session.play_state == PlayState::Playing {
            self.ticker = None;
            if !output.seek_in_place(target) {
                output.stop();
                if let Err(err) = output.start(buffer, target, self.config.looped) {
                    error!(%err, target, "failed to restart playback after seek");
                    self.session.play_state = PlayState::Paused;
                    self.session.position_seconds = target;
                    self.publish();
                    return;
                }
            }
            self.start_ticker(target);
        }

        self.session.position_seconds = target;
        debug!(target, "seeked");
        self.publish();
    }

    /// Sets the volume percent and applies it to the output right away.
    pub fn set_volume(&mut self, value: f64) -> u8 {
        let percent = self.volume.set(value);
        self.volume_changed(percent)
    }

    /// Moves the volume by whole wheel notches.
    pub fn nudge_volume(&mut self, steps: i32) -> u8 {
        let percent = self.volume.nudge(steps);
        self.volume_changed(percent)
    }

    pub fn toggle_mute(&mut self) -> u8 {
        let percent = self.volume.toggle_mute();
        self.volume_changed(percent)
    }

    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    /// Waits until queued volume writes have been attempted.
    pub async fn flush_persistence(&self) {
        self.volume.flush().await;
    }

    /// Applies every load that has finished and advances the progress ticker.
    /// Call once per animation frame.
    pub fn pump(&mut self) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.completions.try_recv() {
            outcomes.push(self.complete_load(completion));
        }
        self.advance_progress();
        outcomes
    }

    /// Waits for the next load to finish and applies it.
    pub async fn next_completion(&mut self) -> Option<LoadOutcome> {
        let completion = self.completions.recv().await?;
        Some(self.complete_load(completion))
    }

    /// Byte magnitudes for the visualiser, sampled at the exact position.
    pub fn frequency_data(&mut self) -> Vec<u8> {
        let position = match (self.session.play_state, self.ticker.as_ref()) {
            (PlayState::Playing, Some(ticker)) => Some(ticker.position_at(self.clock.now())),
            _ => None,
        };

        let Some(analyser) = self.analyser.as_mut() else {
            return vec![0; self.config.analyser.bin_count()];
        };
        match analyser.frequency_data(position) {
            Ok(data) => data,
            Err(err) => {
                warn!(%err, "frequency analysis failed");
                vec![0; analyser.bin_count()]
            }
        }
    }

    /// Stops playback, releases the output and analyser, and returns the
    /// session to its pre-initialisation shape. Loads still in flight can
    /// never apply afterwards.
    pub fn dispose(&mut self) {
        self.ticker = None;
        if let Some(mut output) = self.output.take() {
            output.stop();
        }
        self.analyser = None;
        self.buffer = None;
        self.requested = None;

        while self.completions.try_recv().is_ok() {}

        let generation = self.session.load_generation + 1;
        self.volume.reset();
        self.session = PlaybackSession::new(self.volume.percent(), generation);
        self.initialized = false;
        info!(generation, "playback engine disposed");
        self.publish();
    }

    fn complete_load(&mut self, completion: LoadCompletion) -> LoadOutcome {
        let LoadCompletion {
            generation,
            track,
            result,
        } = completion;

        if generation != self.session.load_generation {
            trace!(generation, current = self.session.load_generation, "discarding stale load");
            return LoadOutcome::Stale { generation };
        }

        let audio = match result {
            Ok(audio) => audio,
            Err(err) => {
                error!(%err, generation, track_id = %track.id, "track failed to load");
                return self.fail_load(generation, track.id);
            }
        };

        let duration = audio.duration_seconds();
        let start = track.preview_offset_seconds().clamp(0.0, duration);
        let looped = self.config.looped;
        let gain = self.volume.gain();

        let Some(output) = self.output.as_mut() else {
            warn!(generation, "audio output vanished before the load finished");
            return self.fail_load(generation, track.id);
        };
        output.set_gain(gain);
        if let Err(err) = output.start(&audio, start, looped) {
            error!(%err, generation, track_id = %track.id, "failed to start playback");
            return self.fail_load(generation, track.id);
        }

        if let Some(analyser) = self.analyser.as_mut() {
            analyser.attach(audio.clone(), looped);
        }
        self.buffer = Some(audio);

        // The list may have been replaced while decoding; a track no longer
        // listed still plays, without an index.
        let index = self.session.tracks.iter().position(|listed| listed.id == track.id);
        let track_id = track.id.clone();
        info!(generation, ?index, track_id = %track_id, start, duration, "playing track");
        self.session.active_track = Some(track);
        self.session.active_index = index;
        self.session.duration_seconds = duration;
        self.session.position_seconds = start;
        self.session.play_state = PlayState::Playing;
        self.start_ticker(start);
        self.publish();

        LoadOutcome::Applied {
            generation,
            track_id,
        }
    }

    fn fail_load(&mut self, generation: u64, track_id: String) -> LoadOutcome {
        self.stop_output();
        self.buffer = None;
        self.session.active_track = None;
        self.session.play_state = PlayState::Idle;
        self.session.position_seconds = 0.0;
        self.session.duration_seconds = 0.0;
        self.publish();
        LoadOutcome::Failed {
            generation,
            track_id,
        }
    }

    fn advance_progress(&mut self) {
        if self.session.play_state != PlayState::Playing {
            return;
        }
        let now = self.clock.now();
        let Some(ticker) = self.ticker.as_mut() else {
            return;
        };

        if ticker.is_finished(now) {
            self.ticker = None;
            if let Some(output) = self.output.as_mut() {
                output.stop();
            }
            self.session.position_seconds = 0.0;
            self.session.play_state = PlayState::Paused;
            debug!("track ended");
            self.publish();
            return;
        }

        if let Some(position) = ticker.poll(now) {
            self.update_progress(position);
        }
    }

    fn update_progress(&mut self, position: f64) {
        self.session.position_seconds = position.clamp(0.0, self.session.duration_seconds);
        self.publish();
    }

    fn start_ticker(&mut self, offset: f64) {
        let ticker = ProgressTicker::start(
            self.clock.now(),
            offset,
            self.session.duration_seconds,
            self.config.tick_interval(),
        )
        .with_looping(self.config.looped);
        self.ticker = Some(ticker);
    }

    fn stop_output(&mut self) {
        self.ticker = None;
        if let Some(output) = self.output.as_mut() {
            output.stop();
        }
    }

    fn ensure_output(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }

        let mut output = self.device.open()?;
        output.set_gain(self.volume.gain());
        self.output = Some(output);
        self.analyser = Some(SpectrumAnalyser::new(self.config.analyser.clone()));
        debug!("opened audio output");
        Ok(())
    }

    fn next_generation(&mut self) -> u64 {
        self.session.load_generation += 1;
        self.session.load_generation
    }

    fn volume_changed(&mut self, percent: u8) -> u8 {
        self.session.volume_percent = percent;
        self.apply_gain();
        self.publish();
        percent
    }

    fn apply_gain(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.set_gain(self.volume.gain());
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("initialized", &self.initialized)
            .field("session", &self.session)
            .field("volume", &self.volume)
            .field("has_output", &self.output.is_some())
            .field("buffer", &self.buffer)
            .field("ticker", &self.ticker)
            .finish()
    }
}
