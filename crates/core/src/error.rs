/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
///
/// Playback operations themselves never surface these to the caller: decode
/// failures, stale completions, persistence failures and invalid indices are
/// all absorbed by the engine. The variants exist for the seams (loaders,
/// output devices, storage) and for the IO helpers around configuration and
/// catalog parsing.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Free-form message, mostly produced by platform collaborators.
    #[error("{0}")]
    Message(String),
    /// A caller handed in data that violates a documented precondition.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Fetching or decoding a track's audio failed.
    #[error("failed to decode `{url}`: {reason}")]
    Decode { url: String, reason: String },
    /// The audio output device could not be opened or driven.
    #[error("audio device error: {0}")]
    Device(String),
    /// The key-value store backing persisted settings failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a config file, catalog payload or storage file.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Shorthand used by loaders when a track cannot be turned into samples.
    pub fn decode(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
