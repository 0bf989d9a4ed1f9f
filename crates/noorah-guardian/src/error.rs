//! Guardian error types.

use thiserror::Error;

/// Result type for guardian operations.
pub type GuardianResult<T> = Result<T, GuardianError>;

/// Errors that can occur while running guardian sessions.
#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session has ended: {0}")]
    SessionEnded(String),

    #[error("User already has an active session: {0}")]
    SessionAlreadyActive(String),

    #[error("Invalid check-in interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid grace period: {0}")]
    InvalidGracePeriod(String),

    #[error("No emergency contacts configured")]
    NoContacts,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GuardianError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound(id.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }
}

impl From<validator::ValidationErrors> for GuardianError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
