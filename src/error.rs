//! Error types for the speech pipeline
//!
//! These never escape the arbitrator: recognizer and synthesizer convert them
//! into [`RecognitionOutcome`](crate::voice::RecognitionOutcome) and
//! [`SynthesisOutcome`](crate::voice::SynthesisOutcome) at their boundary.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the speech pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable capture device
    #[error("no microphone found: {0}")]
    NoMicrophone(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// A remote service credential is not configured
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Typed input could not be read
    #[error("input error: {0}")]
    Input(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Self::Audio(format!("wav: {e}"))
    }
}
