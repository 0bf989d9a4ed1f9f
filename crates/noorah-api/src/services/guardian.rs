//! Guardian Mode service: session lifecycle plus event dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use noorah_guardian::metrics as guardian_metrics;
use noorah_guardian::state_machine::{self, StartSession};
use noorah_guardian::{
    DispatchReport, EscalationPolicy, GuardianConfig, GuardianError, GuardianResult, NotificationDispatcher,
    SessionLogger, SessionRegistry,
};
use noorah_models::{CheckIn, EmergencyContact, GuardianEvent, GuardianSession, Location, SessionId};
use serde::Serialize;
use tracing::Instrument;

/// Ended sessions are kept this long for lookups before being pruned.
const ENDED_SESSION_RETENTION_HOURS: i64 = 24;

/// A session plus the outcome of the notifications its transition caused.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate {
    pub session: GuardianSession,
    pub notifications: DispatchReport,
}

/// Result of one monitor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub sessions_checked: usize,
    pub events: usize,
    pub notifications: DispatchReport,
    pub pruned: usize,
}

/// Guardian service.
#[derive(Clone)]
pub struct GuardianService {
    config: GuardianConfig,
    registry: Arc<SessionRegistry>,
    dispatcher: NotificationDispatcher,
}

impl GuardianService {
    pub fn new(config: GuardianConfig, registry: Arc<SessionRegistry>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            config,
            registry,
            dispatcher,
        }
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &EscalationPolicy {
        self.dispatcher.policy()
    }

    pub async fn contacts(&self, uid: &str) -> Vec<EmergencyContact> {
        self.registry.contacts(uid).await
    }

    pub async fn set_contacts(&self, uid: &str, contacts: Vec<EmergencyContact>) -> GuardianResult<Vec<EmergencyContact>> {
        self.registry.set_contacts(uid, contacts).await
    }

    /// Start a session. The user needs at least one emergency contact.
    pub async fn start(
        &self,
        uid: &str,
        booking_id: Option<String>,
        check_in_interval: Option<Duration>,
        grace_period: Option<Duration>,
        now: DateTime<Utc>,
    ) -> GuardianResult<GuardianSession> {
        if self.registry.contacts(uid).await.is_empty() {
            return Err(GuardianError::NoContacts);
        }

        let req = StartSession {
            user_id: uid.to_string(),
            booking_id,
            check_in_interval,
            grace_period,
        };
        let session = state_machine::start(req, &self.config, now)?;
        self.registry.insert(session.clone()).await?;

        guardian_metrics::record_session_started();
        guardian_metrics::set_active_sessions(self.registry.live_count().await);
        SessionLogger::new(&session).started(&session);
        Ok(session)
    }

    pub async fn current(&self, uid: &str) -> Option<GuardianSession> {
        self.registry.current_for_user(uid).await
    }

    /// Fetch a session owned by `uid`. Other users' sessions look missing.
    pub async fn get(&self, uid: &str, id: &SessionId) -> GuardianResult<GuardianSession> {
        self.registry
            .get(id)
            .await
            .filter(|s| s.user_id == uid)
            .ok_or_else(|| GuardianError::not_found(id.as_str()))
    }

    pub async fn check_in(&self, uid: &str, id: &SessionId, check_in: CheckIn) -> GuardianResult<SessionUpdate> {
        let (events, session) = self
            .registry
            .update(id, |s| {
                ensure_owner(s, uid)?;
                state_machine::check_in(s, check_in)
            })
            .await?;

        guardian_metrics::record_check_in();
        let logger = SessionLogger::new(&session);
        logger.checked_in(&session);

        let notifications = self.dispatch_all(&logger, &events).await;
        Ok(SessionUpdate { session, notifications })
    }

    /// Raise an SOS.
    pub async fn panic(
        &self,
        uid: &str,
        id: &SessionId,
        location: Option<Location>,
        now: DateTime<Utc>,
    ) -> GuardianResult<SessionUpdate> {
        let (events, session) = self
            .registry
            .update(id, |s| {
                ensure_owner(s, uid)?;
                state_machine::panic(s, now, location)
            })
            .await?;

        let logger = SessionLogger::new(&session);
        let notifications = self.dispatch_all(&logger, &events).await;
        Ok(SessionUpdate { session, notifications })
    }

    pub async fn end(&self, uid: &str, id: &SessionId, now: DateTime<Utc>) -> GuardianResult<SessionUpdate> {
        let (events, session) = self
            .registry
            .update(id, |s| {
                ensure_owner(s, uid)?;
                state_machine::end(s, now)
            })
            .await?;

        let logger = SessionLogger::new(&session);
        logger.ended(&session);
        guardian_metrics::record_session_ended(!events.is_empty());
        guardian_metrics::set_active_sessions(self.registry.live_count().await);

        let notifications = self.dispatch_all(&logger, &events).await;
        Ok(SessionUpdate { session, notifications })
    }

    /// Tick every live session once and dispatch whatever falls due.
    pub async fn tick_all(&self, now: DateTime<Utc>) -> TickSummary {
        let started = Instant::now();
        let ids = self.registry.live_session_ids().await;
        let mut summary = TickSummary {
            sessions_checked: ids.len(),
            ..Default::default()
        };

        let policy = self.dispatcher.policy().clone();
        for id in ids {
            let result = self
                .registry
                .update(&id, |s| Ok(state_machine::tick(s, &policy, now)))
                .await;

            // Ended between listing and ticking
            let Ok((events, session)) = result else {
                continue;
            };
            if events.is_empty() {
                continue;
            }

            summary.events += events.len();
            let logger = SessionLogger::new(&session);
            let report = self.dispatch_all(&logger, &events).instrument(logger.span()).await;
            summary.notifications.merge(report);
        }

        summary.pruned = self.registry.prune_ended(now - chrono::Duration::hours(ENDED_SESSION_RETENTION_HOURS)).await;
        guardian_metrics::set_active_sessions(self.registry.live_count().await);
        guardian_metrics::record_monitor_pass(started.elapsed().as_secs_f64() * 1000.0);
        summary
    }

    async fn dispatch_all(&self, logger: &SessionLogger, events: &[GuardianEvent]) -> DispatchReport {
        let mut total = DispatchReport::default();
        if events.is_empty() {
            return total;
        }

        let contacts = self.registry.contacts(logger.user_id()).await;
        for event in events {
            guardian_metrics::record_event(event.kind, event.level);
            let report = self.dispatcher.dispatch(event, &contacts).await;
            logger.event(event, &report);
            total.merge(report);
        }
        total
    }
}

fn ensure_owner(session: &GuardianSession, uid: &str) -> GuardianResult<()> {
    if session.user_id != uid {
        return Err(GuardianError::not_found(session.id.as_str()));
    }
    Ok(())
}
