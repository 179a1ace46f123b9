//! Scripted collaborators shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rhythm_player_core::{
    AudioOutput, Collaborators, DecodedAudio, Gain, ManualClock, MemoryStorage, OutputDevice,
    PlaybackEngine, PlayerConfig, PlayerError, Result, Track, TrackLoader,
};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

pub const SAMPLE_RATE: u32 = 1_000;

// ============================================================================
// LOADER
// ============================================================================

#[derive(Default)]
struct LoaderState {
    calls: Vec<String>,
    waiting: HashMap<String, VecDeque<oneshot::Sender<Result<DecodedAudio>>>>,
    ready: HashMap<String, VecDeque<Result<DecodedAudio>>>,
}

/// Loader whose decodes only finish when a test resolves them.
#[derive(Clone, Default)]
pub struct ScriptedLoader {
    state: Arc<Mutex<LoaderState>>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finishes the oldest pending load of `url`, or the next one to start.
    pub fn resolve(&self, url: &str, result: Result<DecodedAudio>) {
        let mut state = self.state.lock().unwrap();
        if let Some(waiter) = state.waiting.get_mut(url).and_then(VecDeque::pop_front) {
            let _ = waiter.send(result);
        } else {
            state.ready.entry(url.to_string()).or_default().push_back(result);
        }
    }

    pub fn succeed(&self, url: &str, seconds: f64) {
        self.resolve(url, Ok(silence(seconds)));
    }

    pub fn fail(&self, url: &str) {
        self.resolve(url, Err(PlayerError::decode(url, "unsupported codec")));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl TrackLoader for ScriptedLoader {
    async fn load(&self, url: &str) -> Result<DecodedAudio> {
        let receiver = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(url.to_string());
            if let Some(result) = state.ready.get_mut(url).and_then(VecDeque::pop_front) {
                return result;
            }
            let (sender, receiver) = oneshot::channel();
            state.waiting.entry(url.to_string()).or_default().push_back(sender);
            receiver
        };

        receiver
            .await
            .unwrap_or_else(|_| Err(PlayerError::msg("load abandoned by test")))
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Start { offset: f64, looped: bool, frames: usize },
    Stop,
    Gain(Gain),
    Seek(f64),
}

#[derive(Default)]
struct DeviceLog {
    opens: usize,
    events: Vec<OutputEvent>,
    fail_open: bool,
    fail_start: bool,
    in_place_seek: bool,
}

/// Output device that records everything the engine asks of it.
#[derive(Clone, Default)]
pub struct RecordingDevice {
    log: Arc<Mutex<DeviceLog>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> usize {
        self.log.lock().unwrap().opens
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.log.lock().unwrap().events.clone()
    }

    pub fn starts(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutputEvent::Start { offset, .. } => Some(offset),
                _ => None,
            })
            .collect()
    }

    pub fn last_gain(&self) -> Option<Gain> {
        self.events().into_iter().rev().find_map(|event| match event {
            OutputEvent::Gain(gain) => Some(gain),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().events.clear();
    }

    pub fn fail_open(&self, fail: bool) {
        self.log.lock().unwrap().fail_open = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.log.lock().unwrap().fail_start = fail;
    }

    pub fn support_in_place_seek(&self, supported: bool) {
        self.log.lock().unwrap().in_place_seek = supported;
    }
}

impl OutputDevice for RecordingDevice {
    fn open(&mut self) -> Result<Box<dyn AudioOutput>> {
        let mut log = self.log.lock().unwrap();
        if log.fail_open {
            return Err(PlayerError::Device("no output device".into()));
        }
        log.opens += 1;
        Ok(Box::new(RecordingOutput {
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingOutput {
    log: Arc<Mutex<DeviceLog>>,
}

impl AudioOutput for RecordingOutput {
    fn start(&mut self, audio: &DecodedAudio, offset_seconds: f64, looped: bool) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_start {
            return Err(PlayerError::Device("stream refused to start".into()));
        }
        log.events.push(OutputEvent::Start {
            offset: offset_seconds,
            looped,
            frames: audio.frames(),
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().events.push(OutputEvent::Stop);
    }

    fn set_gain(&mut self, gain: Gain) {
        self.log.lock().unwrap().events.push(OutputEvent::Gain(gain));
    }

    fn seek_in_place(&mut self, offset_seconds: f64) -> bool {
        let mut log = self.log.lock().unwrap();
        if log.in_place_seek {
            log.events.push(OutputEvent::Seek(offset_seconds));
        }
        log.in_place_seek
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct Harness {
    pub engine: PlaybackEngine,
    pub loader: ScriptedLoader,
    pub device: RecordingDevice,
    pub storage: Arc<MemoryStorage>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default(), Arc::new(MemoryStorage::new()))
    }

    pub fn with_config(config: PlayerConfig, storage: Arc<MemoryStorage>) -> Self {
        let loader = ScriptedLoader::new();
        let device = RecordingDevice::new();
        let clock = ManualClock::new();

        let engine = PlaybackEngine::new(
            config,
            Collaborators {
                device: Box::new(device.clone()),
                loader: Arc::new(loader.clone()),
                storage: storage.clone(),
                clock: Arc::new(clock.clone()),
            },
            Handle::current(),
        )
        .expect("default config is valid");

        Self {
            engine,
            loader,
            device,
            storage,
            clock,
        }
    }

    /// Initialised engine holding `ids` as its track list.
    pub fn with_tracks(ids: &[&str]) -> Self {
        let mut harness = Self::new();
        harness.engine.initialize();
        harness.engine.set_tracks(ids.iter().map(|id| track(id, 0)).collect());
        harness
    }

    /// Requests `index` and lets its decode finish with `seconds` of audio.
    pub async fn play_loaded(&mut self, index: usize, seconds: f64) {
        let url = self.engine.tracks()[index].audio_url.clone();
        self.engine.play_track_by_index(index);
        self.loader.succeed(&url, seconds);
        self.engine.next_completion().await.expect("completion channel is open");
    }
}

pub fn track(id: &str, preview_offset_ms: i64) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {id}"),
        artist: format!("Artist {id}"),
        audio_url: url(id),
        background_url: format!("/songs/{id}/bg.jpg"),
        preview_offset_ms,
    }
}

pub fn url(id: &str) -> String {
    format!("/songs/{id}/audio.ogg")
}

pub fn silence(seconds: f64) -> DecodedAudio {
    DecodedAudio::silence(seconds, SAMPLE_RATE)
}

/// Gives spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
