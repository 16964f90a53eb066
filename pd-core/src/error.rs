//! Global error types for the Playdeck client.
//!
//! All error categories across the client are unified into a single
//! `PdError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using PdError.
pub type PdResult<T> = Result<T, PdError>;

/// Unified error type covering all error categories in the Playdeck client.
#[derive(Error, Debug)]
pub enum PdError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Endpoint resolution errors --
    /// An operator-supplied override URL could not be normalized.
    /// The resolver falls back to automatic environment detection.
    #[error("unusable override url: {0}")]
    AddressResolution(String),

    // -- Channel errors --
    /// Opening the channel to the backend failed before any frame exchange.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The channel failed while sending or receiving a frame.
    #[error("channel error: {0}")]
    Channel(String),

    /// An operation required a connected channel and there was none.
    #[error("not connected")]
    NotConnected,

    /// An inbound frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    // -- Relay errors --
    /// The pub/sub relay rejected or failed an operation.
    #[error("relay error: {0}")]
    Relay(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for PdError {
    fn from(e: serde_json::Error) -> Self {
        PdError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PdError {
    fn from(e: toml::de::Error) -> Self {
        PdError::Config(e.to_string())
    }
}
