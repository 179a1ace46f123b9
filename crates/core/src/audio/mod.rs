//! Seams to the platform: decoding, the output device, and the decoded
//! buffers passed between them.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Gain, PlayerError, Result};

/// Fully decoded track, shared between the output and the analysis tap.
#[derive(Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Wraps interleaved samples. The sample count must be a whole number of
    /// frames.
    pub fn new(samples: impl Into<Arc<[f32]>>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(PlayerError::InvalidInput("decoded audio needs at least one channel"));
        }
        if sample_rate == 0 {
            return Err(PlayerError::InvalidInput("decoded audio needs a sample rate"));
        }

        let samples = samples.into();
        if samples.len() % usize::from(channels) != 0 {
            return Err(PlayerError::InvalidInput(
                "decoded audio must contain whole frames",
            ));
        }

        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Mono silence of the given length, handy for hosts without a decoder.
    pub fn silence(seconds: f64, sample_rate: u32) -> Self {
        let frames = (seconds.max(0.0) * f64::from(sample_rate.max(1))).round() as usize;
        Self {
            samples: vec![0.0; frames].into(),
            channels: 1,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Channel average of frame `index`, or silence past the end.
    pub fn mono_frame(&self, index: usize) -> f32 {
        let channels = usize::from(self.channels);
        let start = index * channels;
        match self.samples.get(start..start + channels) {
            Some(frame) => frame.iter().sum::<f32>() / channels as f32,
            None => 0.0,
        }
    }
}

impl std::fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("frames", &self.frames())
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// The platform's fetch-and-decode facility.
///
/// Loads may take arbitrarily long and are never aborted; the engine simply
/// ignores results it no longer wants.
#[async_trait]
pub trait TrackLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<DecodedAudio>;
}

/// Opens the output lazily; the first call happens on the first load so that
/// platforms requiring a user gesture before audio are satisfied.
pub trait OutputDevice {
    fn open(&mut self) -> Result<Box<dyn AudioOutput>>;
}

/// A single-buffer player.
///
/// `start` always begins from the given offset; positions cannot be changed
/// while started unless [`AudioOutput::seek_in_place`] says otherwise.
pub trait AudioOutput {
    fn start(&mut self, audio: &DecodedAudio, offset_seconds: f64, looped: bool) -> Result<()>;

    fn stop(&mut self);

    fn set_gain(&mut self, gain: Gain);

    /// Moves a started player to `offset_seconds`. Returns `false` when the
    /// device cannot do that and needs a stop/start instead.
    fn seek_in_place(&mut self, _offset_seconds: f64) -> bool {
        false
    }
}
