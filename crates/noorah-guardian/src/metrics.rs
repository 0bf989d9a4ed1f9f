//! Guardian Mode metrics.
//!
//! - Session lifecycle counters and a live-session gauge
//! - Check-ins and escalations by level
//! - Notification deliveries by channel and outcome

use metrics::{counter, gauge, histogram};
use noorah_models::{EscalationLevel, GuardianEventKind, NotificationChannel};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Sessions started.
    pub const SESSIONS_STARTED_TOTAL: &str = "noorah_guardian_sessions_started_total";

    /// Sessions ended.
    pub const SESSIONS_ENDED_TOTAL: &str = "noorah_guardian_sessions_ended_total";

    /// Sessions currently live.
    pub const SESSIONS_ACTIVE: &str = "noorah_guardian_sessions_active";

    /// Check-ins received.
    pub const CHECK_INS_TOTAL: &str = "noorah_guardian_check_ins_total";

    /// Events emitted by kind and level.
    pub const EVENTS_TOTAL: &str = "noorah_guardian_events_total";

    /// Notifications by channel and outcome.
    pub const NOTIFICATIONS_TOTAL: &str = "noorah_guardian_notifications_total";

    /// Delivery latency in seconds by channel.
    pub const NOTIFICATION_LATENCY_SECONDS: &str = "noorah_guardian_notification_latency_seconds";

    /// Monitor pass duration in seconds.
    pub const MONITOR_PASS_SECONDS: &str = "noorah_guardian_monitor_pass_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_session_started() {
    counter!(names::SESSIONS_STARTED_TOTAL).increment(1);
}

pub fn record_session_ended(escalated: bool) {
    counter!(
        names::SESSIONS_ENDED_TOTAL,
        "escalated" => escalated.to_string()
    )
    .increment(1);
}

pub fn set_active_sessions(count: usize) {
    gauge!(names::SESSIONS_ACTIVE).set(count as f64);
}

pub fn record_check_in() {
    counter!(names::CHECK_INS_TOTAL).increment(1);
}

pub fn record_event(kind: GuardianEventKind, level: EscalationLevel) {
    counter!(
        names::EVENTS_TOTAL,
        "kind" => kind.as_str(),
        "level" => level.as_str()
    )
    .increment(1);
}

pub fn record_notification(channel: NotificationChannel, delivered: bool, latency_ms: f64) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!(
        names::NOTIFICATIONS_TOTAL,
        "channel" => channel.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        names::NOTIFICATION_LATENCY_SECONDS,
        "channel" => channel.as_str()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_monitor_pass(duration_ms: f64) {
    histogram!(names::MONITOR_PASS_SECONDS).record(duration_ms / 1000.0);
}
