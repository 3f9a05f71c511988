//! Error types for viewtree-core

use thiserror::Error;

/// Result type alias for viewtree-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside of parsing.
///
/// Malformed document text is never an error: it becomes
/// [`StructuralError`](crate::parser::StructuralError) entries instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration value rejected during validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON (initialization options) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URI that does not point at a local file
    #[error("Not a file URI: {0}")]
    NotAFileUri(String),
}
