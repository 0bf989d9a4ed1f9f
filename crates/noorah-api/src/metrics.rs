//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "noorah_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "noorah_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "noorah_http_requests_in_flight";

    // MFA metrics
    pub const MFA_VERIFICATIONS_TOTAL: &str = "noorah_mfa_verifications_total";
    pub const MFA_LOCKOUTS_TOTAL: &str = "noorah_mfa_lockouts_total";
    pub const MFA_ENROLLMENTS_TOTAL: &str = "noorah_mfa_enrollments_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "noorah_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an MFA verification. `method` is `none` when nothing matched.
pub fn record_mfa_verification(method: &str, success: bool) {
    let labels = [
        ("method", method.to_string()),
        ("outcome", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!(names::MFA_VERIFICATIONS_TOTAL, &labels).increment(1);
}

pub fn record_mfa_lockout() {
    counter!(names::MFA_LOCKOUTS_TOTAL).increment(1);
}

/// Record an enrollment change (`enabled`, `disabled`, `codes_regenerated`).
pub fn record_mfa_enrollment(event: &str) {
    let labels = [("event", event.to_string())];
    counter!(names::MFA_ENROLLMENTS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static SESSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/sessions/([A-Za-z0-9_-]+)").unwrap());

/// Sanitize path for metrics labels (collapse IDs).
fn sanitize_path(path: &str) -> String {
    let path = SESSION_SEGMENT.replace_all(path, |caps: &regex_lite::Captures| {
        if &caps[1] == "current" {
            "/sessions/current".to_string()
        } else {
            "/sessions/:session_id".to_string()
        }
    });
    UUID_SEGMENT.replace_all(&path, ":id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/guardian/sessions/550e8400-e29b-41d4-a716-446655440000/check-in"),
            "/api/guardian/sessions/:session_id/check-in"
        );
        assert_eq!(
            sanitize_path("/api/guardian/sessions/current"),
            "/api/guardian/sessions/current"
        );
        assert_eq!(sanitize_path("/api/mfa/verify"), "/api/mfa/verify");
    }
}
