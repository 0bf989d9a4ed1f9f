//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::guardian::{
    check_in, current_session, end_session, get_contacts, get_session, panic_session, start_session,
    update_contacts,
};
use crate::handlers::mfa::{mfa_disable, mfa_enable, mfa_setup, mfa_status, mfa_verify, regenerate_backup_codes};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mfa_routes = Router::new()
        .route("/mfa/status", get(mfa_status))
        .route("/mfa/setup", post(mfa_setup))
        .route("/mfa/enable", post(mfa_enable))
        .route("/mfa/verify", post(mfa_verify))
        .route("/mfa/disable", post(mfa_disable))
        .route("/mfa/backup-codes/regenerate", post(regenerate_backup_codes));

    let guardian_routes = Router::new()
        .route("/guardian/contacts", get(get_contacts).put(update_contacts))
        .route("/guardian/sessions", post(start_session))
        .route("/guardian/sessions/current", get(current_session))
        .route("/guardian/sessions/:session_id", get(get_session))
        .route("/guardian/sessions/:session_id/check-in", post(check_in))
        .route("/guardian/sessions/:session_id/panic", post(panic_session))
        .route("/guardian/sessions/:session_id/end", post(end_session));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(mfa_routes)
        .merge(guardian_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
