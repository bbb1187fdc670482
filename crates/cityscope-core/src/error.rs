// crates/cityscope-core/src/error.rs

use thiserror::Error;

/// Everything that can go wrong while loading, caching or enriching cities.
#[derive(Debug, Error)]
pub enum CityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered, but not with a 2xx.
    #[error("remote responded with status {0}")]
    Status(u16),

    #[error("remote responded with an empty body")]
    EmptyBody,

    #[error("favorites database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, CityError>;
