//! Error types for launchrank
//!
//! Provides standardized error handling across the relevance engine.

use thiserror::Error;

/// Errors that can occur in launchrank
#[derive(Debug, Error)]
pub enum RankError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Usage database errors (locked, corrupt, schema mismatch)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A command id that the catalogue doesn't know
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON export errors
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for launchrank operations
pub type RankResult<T> = Result<T, RankError>;

impl From<rusqlite::Error> for RankError {
    fn from(err: rusqlite::Error) -> Self {
        RankError::Storage(err.to_string())
    }
}
