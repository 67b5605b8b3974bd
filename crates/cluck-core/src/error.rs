//! Error types for Cluck Gamepack

use thiserror::Error;

/// Result type alias for gamepack operations
pub type GamepackResult<T> = Result<T, GamepackError>;

/// Main error type for the gamepack shell
#[derive(Error, Debug)]
pub enum GamepackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("WebView error: {0}")]
    WebView(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GamepackError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new WebView error
    pub fn webview(msg: impl Into<String>) -> Self {
        Self::WebView(msg.into())
    }

    /// Create a new platform error
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a new permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
