//! Headless output sink for terminals without an audio device.
//!
//! Nothing is rendered to speakers: the sink only keeps track of what it
//! was asked to play so the status line and logs reflect it.

use rhythm_player_core::{AudioOutput, DecodedAudio, Gain, OutputDevice, Result};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct ConsoleDevice;

impl OutputDevice for ConsoleDevice {
    fn open(&mut self) -> Result<Box<dyn AudioOutput>> {
        info!("opened headless audio output");
        Ok(Box::new(ConsoleOutput::default()))
    }
}

#[derive(Debug, Default)]
pub struct ConsoleOutput {
    playing: bool,
    gain: Option<Gain>,
    offset_seconds: f64,
}

impl AudioOutput for ConsoleOutput {
    fn start(&mut self, audio: &DecodedAudio, offset_seconds: f64, looped: bool) -> Result<()> {
        debug!(
            offset_seconds,
            looped,
            duration = audio.duration_seconds(),
            channels = audio.channels(),
            gain = self.gain.map_or(1.0, |gain| gain.linear),
            "output started"
        );
        self.playing = true;
        self.offset_seconds = offset_seconds;
        Ok(())
    }

    fn stop(&mut self) {
        if self.playing {
            debug!("output stopped");
        }
        self.playing = false;
    }

    fn set_gain(&mut self, gain: Gain) {
        debug!(linear = gain.linear, decibels = gain.decibels, "output gain");
        self.gain = Some(gain);
    }

    fn seek_in_place(&mut self, offset_seconds: f64) -> bool {
        if !self.playing {
            return false;
        }
        debug!(offset_seconds, "output seeked");
        self.offset_seconds = offset_seconds;
        true
    }
}
