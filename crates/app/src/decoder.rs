//! Symphonia-backed track loader for local media.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use rhythm_player_core::{DecodedAudio, PlayerError, Result, TrackLoader};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Resolves catalog audio URLs against a media directory and decodes the
/// whole file into memory on the blocking pool.
#[derive(Debug, Clone)]
pub struct SymphoniaLoader {
    media_root: PathBuf,
}

impl SymphoniaLoader {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    /// Maps a server-style URL (`/songs/12/audio.mp3`) onto the media root.
    /// Parent-directory segments are dropped so a URL cannot escape it.
    pub fn resolve(&self, url: &str) -> PathBuf {
        let relative = url.trim_start_matches("file://");
        let mut path = self.media_root.clone();
        for component in Path::new(relative).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }
}

#[async_trait]
impl TrackLoader for SymphoniaLoader {
    async fn load(&self, url: &str) -> Result<DecodedAudio> {
        let path = self.resolve(url);
        debug!(url, path = %path.display(), "decoding track");

        let decoded = tokio::task::spawn_blocking(move || decode_file(&path))
            .await
            .map_err(|err| PlayerError::decode(url, err))?;
        decoded.map_err(|reason| PlayerError::decode(url, reason))
    }
}

fn decode_file(path: &Path) -> std::result::Result<DecodedAudio, String> {
    let file = File::open(path).map_err(|err| format!("cannot open {}: {err}", path.display()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| format!("unrecognised container: {err}"))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| "no audio track".to_string())?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels = track
        .codec_params
        .channels
        .map(|layout| layout.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| format!("unsupported codec: {err}"))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(format!("read failed: {err}")),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt packets are skipped; the rest of the file is still usable.
            Err(SymphoniaError::DecodeError(err)) => warn!(%err, "skipping undecodable packet"),
            Err(err) => return Err(format!("decode failed: {err}")),
        }
    }

    if samples.is_empty() {
        return Err("no audio frames decoded".to_string());
    }

    debug!(
        frames = samples.len() / usize::from(channels.max(1)),
        sample_rate,
        channels,
        "decoded track"
    );
    DecodedAudio::new(samples, channels, sample_rate).map_err(|err| err.to_string())
}
