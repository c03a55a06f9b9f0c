//! Error types for facetalk.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacetalkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Unsupported {kind} engine: {name}")]
    UnsupportedEngine { kind: String, name: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio and text validation errors
    #[error("Invalid audio: {message}")]
    InvalidAudio { message: String },

    #[error("Invalid text: {message}")]
    InvalidText { message: String },

    // Engine errors
    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    #[error("Completion failed: {message}")]
    Completion { message: String },

    #[error("Synthesis failed: {message}")]
    Synthesis { message: String },

    // Delivery errors
    #[error("Delivery connection failed: {message}")]
    DeliveryConnection { message: String },

    #[error("Delivery protocol error: {message}")]
    DeliveryProtocol { message: String },

    #[error("Delivery rejected by server: {message}")]
    DeliveryRejected { message: String },

    #[error("Receiver socket error: {message}")]
    ReceiverSocket { message: String },

    // Health check errors
    #[error("Health check failed: {message}")]
    HealthCheck { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, FacetalkError>;
