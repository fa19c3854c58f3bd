//! Error types for image loading

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between an image reference and an uploaded texture.
///
/// None of these reach the user as a hard failure: the carousel swaps in a
/// fallback texture for the affected index, except for [`LoadError::Cancelled`]
/// which is dropped silently.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Failed to read '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Unsupported image reference: '{0}'")]
    UnsupportedReference(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Texture upload failed: {0}")]
    Upload(String),
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this failure should produce a fallback texture.
    pub fn wants_fallback(&self) -> bool {
        !matches!(self, LoadError::Cancelled)
    }
}

impl From<image::ImageError> for LoadError {
    fn from(err: image::ImageError) -> Self {
        LoadError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Network(err.to_string())
    }
}

/// Failures while putting a carousel together. Unlike [`LoadError`] these are returned to the caller.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Failed to start loader runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Failed to create HTTP client: {0}")]
    Fetcher(LoadError),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
