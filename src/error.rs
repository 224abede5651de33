//! Error types for siphon

use thiserror::Error;

/// Main error type for the siphon library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Local store error (root directory, id file, sentinel)
    #[error("store error: {0}")]
    Store(String),

    /// Hard transport failure (the batch call itself failed)
    #[error("transport error: {0}")]
    Transport(String),

    /// Delivery gave up with records still rejected by the collector
    #[error("partial delivery failure: {rejected} records rejected after {attempts} attempts")]
    PartialDelivery { rejected: usize, attempts: usize },

    /// The platform has no known location for the event store
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Result type alias for siphon
pub type Result<T> = std::result::Result<T, Error>;
