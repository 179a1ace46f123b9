use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AnalyserConfig, DecodedAudio, PlayerError, Result};

/// Maps a decibel reading onto the 0–255 byte scale used by the visualiser.
///
/// Values at or below `min_decibels` (including `-inf` and NaN) map to 0,
/// values at or above `max_decibels` map to 255.
pub fn normalize_decibels(db: f32, min_decibels: f32, max_decibels: f32) -> u8 {
    if db.is_nan() || max_decibels <= min_decibels {
        return 0;
    }

    let scaled = 255.0 * (db - min_decibels) / (max_decibels - min_decibels);
    scaled.clamp(0.0, 255.0).floor() as u8
}

/// Non-mutating analysis tap over the buffer currently playing.
///
/// Each sample windows the `fft_size` mono frames that ended at the playback
/// position, runs a real FFT and reports smoothed magnitudes as bytes. When
/// nothing is audible the tap analyses silence, so bars fall off through the
/// smoothing instead of freezing.
pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    fft: FftResources,
    smoothed: Vec<f32>,
    source: Option<DecodedAudio>,
    looped: bool,
}

impl SpectrumAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let size = config.fft_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let fft = FftResources {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Self {
            smoothed: vec![0.0; size / 2],
            config,
            fft,
            source: None,
            looped: true,
        }
    }

    /// Number of magnitude values produced per sample.
    pub fn bin_count(&self) -> usize {
        self.fft.size / 2
    }

    /// Points the tap at a freshly started buffer.
    pub fn attach(&mut self, audio: DecodedAudio, looped: bool) {
        self.source = Some(audio);
        self.looped = looped;
    }

    /// Drops the buffer and any smoothing history.
    pub fn detach(&mut self) {
        self.source = None;
        self.smoothed.fill(0.0);
    }

    pub fn source(&self) -> Option<&DecodedAudio> {
        self.source.as_ref()
    }

    /// Samples the spectrum at `position` seconds; `None` means silence.
    pub fn frequency_data(&mut self, position: Option<f64>) -> Result<Vec<u8>> {
        let mut out = vec![0; self.bin_count()];
        self.fill_frequency_data(position, &mut out)?;
        Ok(out)
    }

    /// Like [`SpectrumAnalyser::frequency_data`] but writes into `out`, which
    /// may be shorter than [`SpectrumAnalyser::bin_count`].
    pub fn fill_frequency_data(&mut self, position: Option<f64>, out: &mut [u8]) -> Result<()> {
        self.load_window(position);

        let fft = &mut self.fft;
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| PlayerError::msg(format!("spectrum analysis failed: {err}")))?;

        let size = fft.size as f32;
        let smoothing = self.config.smoothing;
        for (index, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = fft.spectrum[index].norm() / size;
            *smoothed = smoothing * *smoothed + (1.0 - smoothing) * magnitude;
            if let Some(slot) = out.get_mut(index) {
                let db = 20.0 * smoothed.log10();
                *slot = normalize_decibels(db, self.config.min_decibels, self.config.max_decibels);
            }
        }

        Ok(())
    }

    fn load_window(&mut self, position: Option<f64>) {
        let size = self.fft.size;
        let input = &mut self.fft.input;

        let (Some(position), Some(audio)) = (position, self.source.as_ref()) else {
            input.fill(0.0);
            return;
        };

        let frames = audio.frames() as i64;
        if frames == 0 {
            input.fill(0.0);
            return;
        }

        let end = (position.max(0.0) * f64::from(audio.sample_rate())).floor() as i64;
        let first = end - size as i64;
        for (offset, slot) in input.iter_mut().enumerate() {
            let frame = first + offset as i64;
            let value = if self.looped {
                audio.mono_frame(frame.rem_euclid(frames) as usize)
            } else if (0..frames).contains(&frame) {
                audio.mono_frame(frame as usize)
            } else {
                0.0
            };
            *slot = value * hann_value(offset, size);
        }
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("config", &self.config)
            .field("fft", &self.fft)
            .field("source", &self.source)
            .field("looped", &self.looped)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
