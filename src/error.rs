//! Error types for the mutation tracker.
//!
//! Wrapping, reading, writing and subscribing never fail. Errors only come
//! out of the conversion helpers and the listener error hook.

use thiserror::Error;

/// Main error type for tracker operations.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("Value is not trackable: {0}")]
    NotTrackable(&'static str),

    #[error("Operation requires a {expected}, got a {got}")]
    KindMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Value cannot be serialized: {0}")]
    NotSerializable(String),

    #[error("Listener panicked: {message}")]
    ListenerPanicked { message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TrackError {
    fn from(e: serde_json::Error) -> Self {
        TrackError::Serialization(e.to_string())
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackError>;
