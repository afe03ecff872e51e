//! Notification error types.

use thiserror::Error;

/// Errors that can occur while delivering events or notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The HTTP request could not be built or sent.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// A listener-specific failure.
    #[error("Listener error: {0}")]
    Listener(String),
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
