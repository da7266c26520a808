//! Error types for the Roam services.

use thiserror::Error;

/// Result type alias using the Roam error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Roam services.
///
/// The variants mirror the turn pipeline's failure taxonomy: geocode
/// failures end the turn with a clarification, fetch failures stay
/// isolated to their branch, persistence failures are logged and the
/// turn is still answered.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Geocoding produced no result or the lookup errored
    #[error("Geocoding failed: {0}")]
    Geocode(String),

    /// A weather or places fetch failed
    #[error("{domain} fetch failed: {reason}")]
    Fetch { domain: String, reason: String },

    /// Session state or cache persistence failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a fetch error for a data domain ("weather" or "places").
    pub fn fetch(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}
