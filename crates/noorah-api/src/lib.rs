//! Axum HTTP API server for the Noorah safety backend.
//!
//! This crate provides:
//! - TOTP multi-factor enrollment and verification endpoints
//! - Guardian Mode contacts and check-in session endpoints
//! - Bearer token verification
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use auth::{AuthUser, JwtVerifier};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{GuardianMonitor, GuardianService, MfaService};
pub use state::AppState;
