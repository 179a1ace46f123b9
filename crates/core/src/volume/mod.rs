//! Volume percent, its device gain, and fire-and-forget persistence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::{PlayerConfig, VolumeCurve, VolumeStorage};

/// Amount a single wheel notch moves the volume.
pub const VOLUME_STEP: f64 = 5.0;

/// Lowest audible level of the logarithmic curve.
const LOG_FLOOR_DB: f32 = -60.0;

/// Gain handed to the output device, in both representations platforms use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gain {
    pub linear: f32,
    pub decibels: f32,
}

impl Gain {
    pub const SILENT: Gain = Gain {
        linear: 0.0,
        decibels: f32::NEG_INFINITY,
    };

    pub fn from_percent(percent: u8, curve: VolumeCurve) -> Self {
        let percent = percent.min(100);
        if percent == 0 {
            return Self::SILENT;
        }

        match curve {
            VolumeCurve::Linear => {
                let linear = f32::from(percent) / 100.0;
                Self {
                    linear,
                    decibels: 20.0 * linear.log10(),
                }
            }
            VolumeCurve::Logarithmic => {
                let decibels = (f32::from(percent) - 100.0) * (-LOG_FLOOR_DB / 100.0);
                Self {
                    linear: 10.0_f32.powf(decibels / 20.0),
                    decibels,
                }
            }
        }
    }
}

/// Clamps an arbitrary slider/wheel value to a whole percent. NaN has no
/// meaningful percent and yields `None`.
pub fn clamp_percent(value: f64) -> Option<u8> {
    if value.is_nan() {
        return None;
    }
    Some(value.clamp(0.0, 100.0).round() as u8)
}

fn parse_stored(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| (0..=100).contains(value))
        .map(|value| value as u8)
}

enum PersistRequest {
    Save(u8),
    Flush(oneshot::Sender<()>),
}

/// Holds the volume percent and keeps the persisted copy in sync.
///
/// The in-memory value changes synchronously; writes go through a single
/// background writer so they land in call order, and a failed write is only
/// logged.
pub struct VolumeStore {
    percent: u8,
    default_percent: u8,
    curve: VolumeCurve,
    key: String,
    storage: Arc<dyn VolumeStorage>,
    muted_from: Option<u8>,
    writer: mpsc::UnboundedSender<PersistRequest>,
}

impl VolumeStore {
    pub fn new(config: &PlayerConfig, storage: Arc<dyn VolumeStorage>, runtime: &Handle) -> Self {
        let (writer, requests) = mpsc::unbounded_channel();
        runtime.spawn(persist_worker(
            Arc::clone(&storage),
            config.volume_key.clone(),
            requests,
        ));

        let default_percent = config.default_volume.min(100);
        Self {
            percent: default_percent,
            default_percent,
            curve: config.volume_curve,
            key: config.volume_key.clone(),
            storage,
            muted_from: None,
            writer,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn gain(&self) -> Gain {
        Gain::from_percent(self.percent, self.curve)
    }

    pub fn is_muted(&self) -> bool {
        self.muted_from.is_some()
    }

    /// Clamps, rounds and stores `value`, queueing it for persistence.
    /// Returns the percent now in effect.
    pub fn set(&mut self, value: f64) -> u8 {
        let Some(percent) = clamp_percent(value) else {
            tracing::debug!(value, "ignoring non-numeric volume");
            return self.percent;
        };

        self.percent = percent;
        self.muted_from = None;
        self.persist(percent);
        percent
    }

    /// Moves the volume by `steps` wheel notches (negative is quieter).
    pub fn nudge(&mut self, steps: i32) -> u8 {
        self.set(f64::from(self.percent) + f64::from(steps) * VOLUME_STEP)
    }

    /// Mutes while remembering the current level, or restores it.
    pub fn toggle_mute(&mut self) -> u8 {
        match self.muted_from {
            Some(previous) => self.set(f64::from(previous)),
            None => {
                let previous = self.percent;
                self.set(0.0);
                self.muted_from = Some(previous);
                0
            }
        }
    }

    /// Loads a previously persisted percent. Absent, malformed or unreadable
    /// values leave the current percent untouched.
    pub fn initialize(&mut self) -> u8 {
        match self.storage.get(&self.key) {
            Ok(Some(raw)) => match parse_stored(&raw) {
                Some(percent) => {
                    self.percent = percent;
                    self.muted_from = None;
                    tracing::debug!(volume = percent, "restored persisted volume");
                }
                None => tracing::warn!(value = %raw, "ignoring malformed persisted volume"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, "failed to read persisted volume"),
        }
        self.percent
    }

    /// Back to the configured default without touching storage.
    pub fn reset(&mut self) {
        self.percent = self.default_percent;
        self.muted_from = None;
    }

    /// Resolves once every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.writer.send(PersistRequest::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn persist(&self, percent: u8) {
        if self.writer.send(PersistRequest::Save(percent)).is_err() {
            tracing::warn!(volume = percent, "volume writer has stopped; not persisting");
        }
    }
}

impl std::fmt::Debug for VolumeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeStore")
            .field("percent", &self.percent)
            .field("curve", &self.curve)
            .field("key", &self.key)
            .field("muted_from", &self.muted_from)
            .finish()
    }
}

async fn persist_worker(
    storage: Arc<dyn VolumeStorage>,
    key: String,
    mut requests: mpsc::UnboundedReceiver<PersistRequest>,
) {
    while let Some(request) = requests.recv().await {
        let mut acks = Vec::new();
        let mut latest = match request {
            PersistRequest::Save(percent) => Some(percent),
            PersistRequest::Flush(ack) => {
                acks.push(ack);
                None
            }
        };

        // A slider scrub queues dozens of values; only the last one matters.
        while let Ok(next) = requests.try_recv() {
            match next {
                PersistRequest::Save(percent) => latest = Some(percent),
                PersistRequest::Flush(ack) => acks.push(ack),
            }
        }

        if let Some(percent) = latest {
            let storage = Arc::clone(&storage);
            let key = key.clone();
            let written =
                tokio::task::spawn_blocking(move || storage.set(&key, &percent.to_string())).await;
            match written {
                Ok(Ok(())) => tracing::trace!(volume = percent, "persisted volume"),
                Ok(Err(err)) => tracing::warn!(%err, volume = percent, "failed to persist volume"),
                Err(err) => tracing::warn!(%err, volume = percent, "volume writer task failed"),
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
}
