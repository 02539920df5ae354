//! Error types for the Allie assistant and relay

use thiserror::Error;

/// Result type alias for Allie operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant or the backend relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone permission was not granted
    #[error("microphone permission denied")]
    PermissionDenied,

    /// `stop()` was called with no recording in progress
    #[error("no active recording")]
    NoActiveRecording,

    /// `start()` was called while a recording is already in progress
    #[error("already recording")]
    AlreadyRecording,

    /// Speech-to-text failed (network error, non-success status, bad body)
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// A weather, sports, schedule, chat or speech call failed
    #[error("downstream call failed: {0}")]
    DownstreamCallFailed(String),

    /// Numeric disambiguation reply out of range
    #[error("invalid selection: {index} (of {available})")]
    InvalidSelection { index: usize, available: usize },

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech synthesis error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(reqwest::Error),

    /// Invalid URL
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<reqwest::Error> for Error {
    /// Upstream query strings carry API keys, so the URL is dropped
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

impl Error {
    /// Wrap any displayable failure as a downstream call failure
    pub fn downstream(e: impl std::fmt::Display) -> Self {
        Self::DownstreamCallFailed(e.to_string())
    }
}
