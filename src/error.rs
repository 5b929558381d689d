//! Error types for hostpanel

use thiserror::Error;

/// Result type alias for hostpanel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hostpanel
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Settings file could not be read or decoded
    #[error("settings error: {0}")]
    Settings(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Authentication/authorization error
    #[error("auth error: {0}")]
    Auth(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Two plugins claimed the same identity
    #[error("duplicate plugin id: {0}")]
    DuplicatePlugin(String),

    /// Plugin construction or discovery error
    #[error("plugin error: {0}")]
    Plugin(String),
}
