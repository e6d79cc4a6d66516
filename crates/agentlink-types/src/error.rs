//! Error hierarchy for AgentLink.

use thiserror::Error;

/// Top-level error type for AgentLink operations.
#[derive(Debug, Error)]
pub enum AgentLinkError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by the agent backend collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to open session: {0}")]
    Open(String),

    #[error("Session initialization failed: {0}")]
    Initialize(String),

    #[error("Failed to send prompt: {0}")]
    Send(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to abort session: {0}")]
    Abort(String),

    #[error("Failed to close session: {0}")]
    Close(String),

    #[error("{0}")]
    Other(String),
}

/// Errors from delivering a signal to the remote peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer channel closed")]
    Closed,

    #[error("Failed to encode signal: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
