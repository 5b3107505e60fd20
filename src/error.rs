//! Error types for the murmur pipeline

use thiserror::Error;

/// Result type alias for murmur operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the capture, transcription, and synthesis paths
#[derive(Debug, Error)]
pub enum Error {
    /// Input device could not be acquired (denied, busy, or absent).
    /// Fatal to `start()`; no partial session state is left behind.
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Audio processing error (stream build, encoding, format)
    #[error("audio error: {0}")]
    Audio(String),

    /// No credential resolved from any configured provider.
    /// Fatal to a single `transcribe` call; the capture session is unaffected.
    #[error("no transcription credential available")]
    MissingCredential,

    /// The transcription service reported an error payload
    #[error("transcription service error: {0}")]
    Upstream(String),

    /// Network failure talking to the transcription service
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The host has no speech engine. Non-fatal; synthesis degrades to a no-op.
    #[error("speech capability missing: {0}")]
    CapabilityMissing(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
