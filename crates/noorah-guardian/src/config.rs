//! Guardian Mode configuration.

use std::time::Duration;

/// Shortest allowed check-in interval.
pub const MIN_CHECK_IN_INTERVAL: Duration = Duration::from_secs(60);

/// Longest allowed check-in interval.
pub const MAX_CHECK_IN_INTERVAL: Duration = Duration::from_secs(4 * 3600);

/// Guardian configuration.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    /// Default time between check-ins
    pub check_in_interval: Duration,
    /// Default time after a due check-in before it counts as missed
    pub grace_period: Duration,
    /// Time between escalation tiers once a check-in is missed
    pub escalation_step: Duration,
    /// How often the background monitor ticks sessions
    pub monitor_interval: Duration,
    /// Whether the background monitor runs
    pub monitor_enabled: bool,
    /// Flag emergency-level notifications for the emergency-services hand-off
    pub emergency_services_enabled: bool,
    /// Relay that receives push/SMS/email notifications as JSON
    pub webhook_url: Option<String>,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            check_in_interval: Duration::from_secs(30 * 60),
            grace_period: Duration::from_secs(5 * 60),
            escalation_step: Duration::from_secs(5 * 60),
            monitor_interval: Duration::from_secs(15),
            monitor_enabled: true,
            emergency_services_enabled: false,
            webhook_url: None,
        }
    }
}

impl GuardianConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            check_in_interval: Duration::from_secs(
                std::env::var("GUARDIAN_CHECK_IN_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30 * 60),
            ),
            grace_period: Duration::from_secs(
                std::env::var("GUARDIAN_GRACE_PERIOD_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5 * 60),
            ),
            escalation_step: Duration::from_secs(
                std::env::var("GUARDIAN_ESCALATION_STEP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5 * 60),
            ),
            monitor_interval: Duration::from_secs(
                std::env::var("GUARDIAN_MONITOR_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(15),
            ),
            monitor_enabled: std::env::var("ENABLE_GUARDIAN_MONITOR")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true), // Enabled by default
            emergency_services_enabled: std::env::var("GUARDIAN_EMERGENCY_SERVICES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            webhook_url: std::env::var("GUARDIAN_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        }
    }
}
