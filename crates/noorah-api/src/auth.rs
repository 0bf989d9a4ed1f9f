//! Bearer token authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
        }
    }
}

/// HS256 token verifier.
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.jwt_issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
        }
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token validation failed: {}", e);
                ApiError::unauthorized(format!("Token validation failed: {}", e))
            })
    }

    /// Sign a token for `uid` valid for `ttl_secs`.
    pub fn issue(&self, uid: &str, email: Option<&str>, ttl_secs: i64) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: uid.to_string(),
            email: email.map(str::to_string),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign token: {}", e)))
    }
}

/// Axum extractor for authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::unauthorized("Missing or malformed Authorization header"))?;

        let claims = state.jwt.verify(bearer.token())?;
        if claims.sub.is_empty() {
            return Err(ApiError::unauthorized("Token has no subject"));
        }
        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-at-least-16".to_string(),
            jwt_issuer: Some("noorah-test".to_string()),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let verifier = JwtVerifier::new(&config());
        let token = verifier.issue("user-1", Some("u@example.com"), 60).unwrap();
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("u@example.com"));
    }

    #[test]
    fn test_rejects_expired_token() {
        let verifier = JwtVerifier::new(&config());
        // Beyond the default 60s leeway
        let token = verifier.issue("user-1", None, -300).unwrap();
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_wrong_secret_and_issuer() {
        let verifier = JwtVerifier::new(&config());
        let other = JwtVerifier::new(&AuthConfig {
            jwt_secret: "another-secret-value".to_string(),
            ..config()
        });
        let token = other.issue("user-1", None, 60).unwrap();
        assert!(verifier.verify(&token).is_err());

        let wrong_issuer = JwtVerifier::new(&AuthConfig {
            jwt_issuer: Some("someone-else".to_string()),
            ..config()
        });
        let token = wrong_issuer.issue("user-1", None, 60).unwrap();
        assert!(verifier.verify(&token).is_err());
    }
}
