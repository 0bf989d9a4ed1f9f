//! Background timer for Guardian Mode.
//!
//! Runs on a fixed interval and:
//! - Ticks every live session (reminders, missed check-ins, escalation)
//! - Dispatches the resulting notifications
//! - Prunes sessions that ended more than a day ago

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::guardian::{GuardianService, TickSummary};

/// Guardian session monitor.
pub struct GuardianMonitor {
    guardian: GuardianService,
    interval: Duration,
    enabled: bool,
    /// Unix seconds of the last completed pass, 0 before the first
    last_pass: Arc<AtomicI64>,
}

impl GuardianMonitor {
    pub fn new(guardian: GuardianService) -> Self {
        let config = guardian.config();
        Self {
            interval: config.monitor_interval,
            enabled: config.monitor_enabled,
            guardian,
            last_pass: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Shared handle the readiness probe uses to see the loop is alive.
    pub fn heartbeat(&self) -> MonitorHeartbeat {
        MonitorHeartbeat {
            last_pass: Arc::clone(&self.last_pass),
            interval: self.interval,
            enabled: self.enabled,
        }
    }

    /// Start the background loop.
    ///
    /// Runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Guardian monitor is disabled");
            return;
        }

        info!("Starting guardian monitor (interval: {:?})", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.check_once(Utc::now()).await;
        }
    }

    /// Run a single pass at `now`.
    pub async fn check_once(&self, now: DateTime<Utc>) -> TickSummary {
        let summary = self.guardian.tick_all(now).await;
        self.last_pass.store(now.timestamp(), Ordering::Relaxed);

        if summary.notifications.failed > 0 {
            warn!(
                events = summary.events,
                failed = summary.notifications.failed,
                "Guardian monitor pass had delivery failures"
            );
        } else if summary.events > 0 {
            info!(
                sessions = summary.sessions_checked,
                events = summary.events,
                delivered = summary.notifications.delivered,
                "Guardian monitor pass complete"
            );
        } else {
            debug!(sessions = summary.sessions_checked, "Guardian monitor pass: nothing due");
        }

        summary
    }
}

/// Read-only view of the monitor's liveness.
#[derive(Clone)]
pub struct MonitorHeartbeat {
    last_pass: Arc<AtomicI64>,
    interval: Duration,
    enabled: bool,
}

impl MonitorHeartbeat {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_pass(&self) -> Option<DateTime<Utc>> {
        match self.last_pass.load(Ordering::Relaxed) {
            0 => None,
            secs => DateTime::from_timestamp(secs, 0),
        }
    }

    /// Healthy when disabled, or when a pass finished within three intervals.
    /// A loop that has not completed its first pass yet counts as healthy.
    pub fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(last) = self.last_pass() else {
            return true;
        };
        let allowed = chrono::Duration::from_std(self.interval * 3).unwrap_or(chrono::Duration::minutes(5));
        now - last <= allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noorah_guardian::{EscalationPolicy, GuardianConfig, NotificationDispatcher, RecordingNotifier, SessionRegistry};
    use noorah_models::EmergencyContact;

    async fn monitor() -> GuardianMonitor {
        monitor_with(GuardianConfig::default()).await
    }

    async fn monitor_with(config: GuardianConfig) -> GuardianMonitor {
        let dispatcher = NotificationDispatcher::new(EscalationPolicy::default())
            .with_notifier(Arc::new(RecordingNotifier::new()));
        let guardian = GuardianService::new(config, Arc::new(SessionRegistry::new()), dispatcher);
        guardian
            .set_contacts("sitter-1", vec![EmergencyContact::with_phone("Dad", "+14155550100")])
            .await
            .unwrap();
        GuardianMonitor::new(guardian)
    }

    #[tokio::test]
    async fn test_check_once_drives_sessions() {
        let monitor = monitor().await;
        let now = Utc::now();
        monitor.guardian.start("sitter-1", None, None, None, now).await.unwrap();

        let summary = monitor.check_once(now).await;
        assert_eq!(summary.sessions_checked, 1);
        assert_eq!(summary.events, 0);

        let summary = monitor.check_once(now + chrono::Duration::minutes(30)).await;
        assert_eq!(summary.events, 1);
        assert_eq!(summary.notifications.delivered, 1);
    }

    #[tokio::test]
    async fn test_heartbeat_tracks_passes() {
        let monitor = monitor().await;
        let heartbeat = monitor.heartbeat();
        let now = Utc::now();

        assert!(heartbeat.last_pass().is_none());
        assert!(heartbeat.is_healthy(now));

        monitor.check_once(now).await;
        assert!(heartbeat.is_healthy(now + chrono::Duration::seconds(30)));
        assert!(!heartbeat.is_healthy(now + chrono::Duration::minutes(10)));
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns_immediately() {
        let config = GuardianConfig {
            monitor_enabled: false,
            monitor_interval: Duration::from_millis(10),
            ..GuardianConfig::default()
        };
        let monitor = monitor_with(config).await;
        let heartbeat = monitor.heartbeat();

        let finished = tokio::time::timeout(Duration::from_millis(200), monitor.run()).await;
        assert!(finished.is_ok());
        assert!(!heartbeat.enabled());
        assert!(heartbeat.last_pass().is_none());
    }
}
