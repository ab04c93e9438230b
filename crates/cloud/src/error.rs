//! Error types for remote artifact fetching.

use thiserror::Error;

/// Errors produced while resolving or fetching a remote artifact.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("artifact unreachable: HTTP {status} fetching {url}")]
    Unreachable { url: String, status: u16 },

    #[error("invalid artifact location: {0}")]
    InvalidLocation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("I/O error writing fetched bytes: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
