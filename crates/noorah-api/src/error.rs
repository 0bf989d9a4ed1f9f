//! API error types.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use noorah_guardian::GuardianError;
use noorah_mfa::MfaError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid verification code")]
    InvalidCode,

    /// Too many failed MFA verifications
    #[error("Too many failed attempts, try again in {retry_after_secs}s")]
    Locked { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("MFA error: {0}")]
    Mfa(#[from] MfaError),

    #[error("Guardian error: {0}")]
    Guardian(#[from] GuardianError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::InvalidCode => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited | ApiError::Locked { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Mfa(e) => match e {
                MfaError::Hmac(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Guardian(e) => match e {
                GuardianError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                GuardianError::SessionEnded(_) | GuardianError::SessionAlreadyActive(_) => StatusCode::CONFLICT,
                GuardianError::InvalidInterval(_)
                | GuardianError::InvalidGracePeriod(_)
                | GuardianError::NoContacts
                | GuardianError::Validation(_) => StatusCode::BAD_REQUEST,
                GuardianError::Notification(_) | GuardianError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable error code for clients that branch on error type.
    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::InvalidCode => Some("invalid_code"),
            ApiError::Locked { .. } => Some("mfa_locked"),
            ApiError::Guardian(GuardianError::SessionEnded(_)) => Some("session_ended"),
            ApiError::Guardian(GuardianError::SessionAlreadyActive(_)) => Some("session_already_active"),
            ApiError::Guardian(GuardianError::NoContacts) => Some("no_emergency_contacts"),
            _ => None,
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Message sent to the client. Internal failures are masked in production.
    fn public_detail(&self, production: bool) -> String {
        if production && self.is_internal() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let production = std::env::var("ENVIRONMENT").is_ok_and(|env| env == "production");
        let detail = self.public_detail(production);

        let body = ErrorResponse {
            detail,
            code: self.code().map(str::to_string),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::Locked { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardian_error_status_mapping() {
        assert_eq!(
            ApiError::from(GuardianError::not_found("s1")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(GuardianError::SessionEnded("s1".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GuardianError::NoContacts).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_locked_is_429_with_retry_after() {
        let response = ApiError::Locked { retry_after_secs: 120 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "120");
    }

    #[test]
    fn test_internal_detail_hidden_in_production() {
        let err = ApiError::internal("db password leaked");
        assert_eq!(err.public_detail(true), "An internal error occurred");
        assert!(err.public_detail(false).contains("db password leaked"));

        let hmac = ApiError::from(MfaError::Hmac("bad key".into()));
        assert_eq!(hmac.public_detail(true), "An internal error occurred");

        // Client errors keep their message everywhere
        let missing = ApiError::not_found("Guardian session s1");
        assert_eq!(missing.public_detail(true), "Not found: Guardian session s1");
    }

    #[test]
    fn test_mfa_errors_are_client_errors() {
        assert_eq!(
            ApiError::from(MfaError::InvalidDigits(4)).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
