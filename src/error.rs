//! Error handling for the zoodb client

use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the zoodb client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT decoding errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Image decoding or encoding errors
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Input rejected before any request was made
    #[error("validation error: {0}")]
    Validation(String),

    /// A remote call failed; the message is suitable for a status line
    #[error("{0}")]
    Gateway(String),

    /// Authentication errors
    #[error("authentication error: {0}")]
    Auth(String),

    /// A multi-step operation where an earlier step already persisted.
    /// `done` describes what succeeded, `failed` what did not, e.g.
    /// "breed saved but tags failed".
    #[error("{done} but {failed}: {source}")]
    Partial {
        done: String,
        failed: String,
        #[source]
        source: Box<Error>,
    },

    /// An image reference that could not be resolved to a usable URL
    #[error("resolution error: {0}")]
    Resolution(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new gateway error
    pub fn gateway<T: fmt::Display>(msg: T) -> Self {
        Error::Gateway(msg.to_string())
    }

    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new resolution error
    pub fn resolution<T: fmt::Display>(msg: T) -> Self {
        Error::Resolution(msg.to_string())
    }

    /// Wrap `source` as a partial failure of a multi-step operation
    pub fn partial<D: fmt::Display, F: fmt::Display>(done: D, failed: F, source: Error) -> Self {
        Error::Partial {
            done: done.to_string(),
            failed: failed.to_string(),
            source: Box::new(source),
        }
    }

    /// Message suitable for an inline save-status line
    pub fn status_message(&self) -> String {
        self.to_string()
    }
}
