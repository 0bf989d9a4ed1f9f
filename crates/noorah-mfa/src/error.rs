//! MFA error types.

use thiserror::Error;

/// Result type for MFA operations.
pub type MfaResult<T> = Result<T, MfaError>;

/// Errors that can occur while handling one-time passwords.
#[derive(Debug, Error)]
pub enum MfaError {
    #[error("Invalid base32 character '{ch}' at position {position}")]
    InvalidBase32 { ch: char, position: usize },

    #[error("Secret too short: {0} bytes (minimum {min})", min = crate::secret::MIN_SECRET_BYTES)]
    SecretTooShort(usize),

    #[error("Invalid digit count: {0} (must be 6-8)")]
    InvalidDigits(u32),

    #[error("Invalid period: {0} seconds")]
    InvalidPeriod(u64),

    #[error("Invalid skew: {0} steps (maximum {max})", max = crate::totp::MAX_SKEW_STEPS)]
    InvalidSkew(u64),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("HMAC error: {0}")]
    Hmac(String),
}

impl MfaError {
    pub fn invalid_label(msg: impl Into<String>) -> Self {
        Self::InvalidLabel(msg.into())
    }
}
