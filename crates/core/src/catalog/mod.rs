//! Track descriptors handed over by the beatmap catalog.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result};

/// A playable audio item with its display metadata.
///
/// Tracks are immutable once received. The catalog serialises them in
/// camelCase and calls the preview offset `previewTime`; both spellings are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub audio_url: String,
    pub background_url: String,
    /// Where the preview starts, in milliseconds. Beatmaps without a preview
    /// point carry `-1`.
    #[serde(alias = "previewTime", default)]
    pub preview_offset_ms: i64,
}

impl Track {
    /// Preview offset in seconds, not yet clamped to the decoded length.
    pub fn preview_offset_seconds(&self) -> f64 {
        self.preview_offset_ms as f64 / 1000.0
    }
}

/// Ordered track list as returned by the catalog (`{ "tracks": [...] }`).
///
/// Order defines skip order; ids are unique within one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackList {
    pub tracks: Vec<Track>,
}

impl TrackList {
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        let list = Self { tracks };
        list.validate()?;
        Ok(list)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let list: Self = serde_json::from_str(json)?;
        list.validate()?;
        Ok(list)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.tracks.len());
        for track in &self.tracks {
            if !seen.insert(track.id.as_str()) {
                return Err(PlayerError::InvalidInput("duplicate track id in catalog"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "tracks": [
            {
                "id": "set-1",
                "order": 0,
                "audioUrl": "/songs/1/audio.mp3",
                "backgroundUrl": "/songs/1/bg.jpg",
                "previewTime": 41250,
                "title": "Blue Zenith",
                "artist": "xi"
            },
            {
                "id": "set-2",
                "order": 1,
                "audioUrl": "/songs/2/audio.mp3",
                "backgroundUrl": "/songs/2/bg.jpg",
                "previewTime": -1,
                "title": "Freedom Dive",
                "artist": "xi"
            }
        ]
    }"#;

    #[test]
    fn parses_catalog_payload_in_order() {
        let list = TrackList::from_json_str(PAYLOAD).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.tracks[0].id, "set-1");
        assert_eq!(list.tracks[0].preview_offset_ms, 41_250);
        assert_eq!(list.tracks[1].preview_offset_ms, -1);
        assert!((list.tracks[0].preview_offset_seconds() - 41.25).abs() < 1e-9);
    }

    #[test]
    fn accepts_the_engine_field_name_too() {
        let json = r#"{ "tracks": [ { "id": "a", "title": "t", "artist": "a",
            "audioUrl": "a.ogg", "backgroundUrl": "a.jpg", "previewOffsetMs": 1500 } ] }"#;
        let list = TrackList::from_json_str(json).unwrap();
        assert_eq!(list.tracks[0].preview_offset_ms, 1500);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let track = TrackList::from_json_str(PAYLOAD).unwrap().tracks[0].clone();
        let err = TrackList::new(vec![track.clone(), track]).unwrap_err();
        assert!(format!("{err}").contains("duplicate"));
    }

    #[test]
    fn serialises_in_camel_case() {
        let list = TrackList::from_json_str(PAYLOAD).unwrap();
        let json = serde_json::to_string(&list.tracks[0]).unwrap();
        assert!(json.contains("\"audioUrl\""));
        assert!(json.contains("\"previewOffsetMs\":41250"));
    }
}
