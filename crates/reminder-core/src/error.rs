//! Core error types for reminder-core.
//!
//! Nothing in the delivery path is fatal: the service recovers every one of
//! these locally (remote failure falls back to the slot, a malformed slot
//! reads as empty). The types exist so each layer can report *what* went
//! wrong before the caller decides on the fallback.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for reminder-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Remote notification source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Persistence slot errors
    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A notification without a trackable identity reached an operation
    /// that needs one.
    #[error("Notification '{title}' has no trackable identity")]
    UnknownIdentity { title: String },
}

/// Errors from the notification-source API.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("Network unavailable for {endpoint}: {source}")]
    NetworkUnavailable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// The configured base URL cannot be turned into an endpoint.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The body was not the expected JSON shape.
    #[error("Unexpected response body from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Remote fetching is switched off.
    #[error("Remote source disabled")]
    Disabled,
}

/// Persistence slot errors.
#[derive(Error, Debug)]
pub enum SlotError {
    /// Slot content is not JSON, or not an array.
    #[error("Malformed persisted data in {path}: {message}")]
    MalformedPersistedData { path: PathBuf, message: String },

    /// IO errors while reading or replacing the slot file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode the notification set
    #[error("Failed to serialize slot: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The slot directory could not be watched
    #[error("Slot watcher failed: {0}")]
    Watch(#[from] notify::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
