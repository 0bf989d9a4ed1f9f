//! Guardian session state machine.
//!
//! Every transition takes `now` explicitly so the timer logic can be driven
//! deterministically from tests and from the background monitor alike.
//!
//! ```text
//!   start ──► Active ──(due)──► Overdue ──(due + grace)──► Escalated ──(step)──► Escalated ...
//!               ▲                  │                           │
//!               └──── check_in ────┴───────────────────────────┘
//!   panic: any live state ──► Escalated @ Emergency
//!   end:   any live state ──► Ended
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use noorah_models::{
    CheckIn, EscalationLevel, GuardianEvent, GuardianEventKind, GuardianSession, GuardianStatus, Location,
    SessionId,
};
use tracing::warn;
use validator::Validate;

use crate::config::{GuardianConfig, MAX_CHECK_IN_INTERVAL, MIN_CHECK_IN_INTERVAL};
use crate::error::{GuardianError, GuardianResult};
use crate::escalation::EscalationPolicy;

/// Parameters for a new session. Unset durations fall back to config defaults.
#[derive(Debug, Clone, Default)]
pub struct StartSession {
    pub user_id: String,
    pub booking_id: Option<String>,
    pub check_in_interval: Option<Duration>,
    pub grace_period: Option<Duration>,
}

impl StartSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Start a session. The first check-in is due one interval from `now`.
pub fn start(req: StartSession, config: &GuardianConfig, now: DateTime<Utc>) -> GuardianResult<GuardianSession> {
    let interval = req.check_in_interval.unwrap_or(config.check_in_interval);
    let grace = req.grace_period.unwrap_or(config.grace_period);

    if interval < MIN_CHECK_IN_INTERVAL || interval > MAX_CHECK_IN_INTERVAL {
        return Err(GuardianError::InvalidInterval(format!(
            "{}s is outside {}s..={}s",
            interval.as_secs(),
            MIN_CHECK_IN_INTERVAL.as_secs(),
            MAX_CHECK_IN_INTERVAL.as_secs()
        )));
    }
    if grace > interval {
        return Err(GuardianError::InvalidGracePeriod(format!(
            "{}s exceeds the {}s check-in interval",
            grace.as_secs(),
            interval.as_secs()
        )));
    }

    let mut session = GuardianSession {
        id: SessionId::new(),
        user_id: req.user_id,
        booking_id: req.booking_id,
        status: GuardianStatus::Active,
        escalation_level: EscalationLevel::None,
        check_in_interval_secs: interval.as_secs(),
        grace_period_secs: grace.as_secs(),
        started_at: now,
        last_check_in: None,
        next_check_in_due: now,
        missed_check_ins: 0,
        escalated_at: None,
        ended_at: None,
        last_location: None,
        event_seq: 0,
    };
    session.next_check_in_due = now + session.check_in_interval();
    Ok(session)
}

/// Record a check-in. Clears any escalation and schedules the next one.
pub fn check_in(session: &mut GuardianSession, check_in: CheckIn) -> GuardianResult<Vec<GuardianEvent>> {
    ensure_live(session)?;
    check_in.validate()?;

    let mut events = Vec::new();
    let previous_level = session.escalation_level;
    if previous_level.involves_contacts() {
        events.push(emit(
            session,
            GuardianEventKind::AllClear,
            previous_level,
            check_in.at,
            check_in.location,
        ));
    }

    session.status = GuardianStatus::Active;
    session.escalation_level = EscalationLevel::None;
    session.escalated_at = None;
    session.last_check_in = Some(check_in.at);
    session.next_check_in_due = check_in.at + session.check_in_interval();
    if check_in.location.is_some() {
        session.last_location = check_in.location;
    }

    Ok(events)
}

/// Advance the session timer. At most one transition happens per call, and a
/// call that finds nothing due changes nothing.
pub fn tick(session: &mut GuardianSession, policy: &EscalationPolicy, now: DateTime<Utc>) -> Vec<GuardianEvent> {
    match session.status {
        GuardianStatus::Active if now >= session.next_check_in_due => {
            session.status = GuardianStatus::Overdue;
            session.escalation_level = EscalationLevel::Reminder;
            vec![emit(
                session,
                GuardianEventKind::CheckInReminder,
                EscalationLevel::Reminder,
                now,
                None,
            )]
        }
        GuardianStatus::Overdue if now >= session.missed_deadline() => {
            session.status = GuardianStatus::Escalated;
            session.escalation_level = EscalationLevel::PrimaryContacts;
            session.missed_check_ins += 1;
            session.escalated_at = Some(now);
            let location = session.last_location;
            vec![emit(
                session,
                GuardianEventKind::MissedCheckIn,
                EscalationLevel::PrimaryContacts,
                now,
                location,
            )]
        }
        GuardianStatus::Escalated if session.escalation_level < EscalationLevel::Emergency => {
            let step = chrono::Duration::from_std(policy.step).unwrap_or_else(|_| chrono::Duration::days(365));
            let reached = session.escalated_at.unwrap_or(session.started_at);
            if now < reached + step {
                return Vec::new();
            }
            let level = session.escalation_level.next();
            session.escalation_level = level;
            session.escalated_at = Some(now);
            let location = session.last_location;
            vec![emit(session, GuardianEventKind::Escalate, level, now, location)]
        }
        _ => Vec::new(),
    }
}

/// Raise an SOS. Jumps straight to the emergency tier.
///
/// An out-of-range location is dropped rather than refusing the alert; the
/// last good fix is sent instead.
pub fn panic(
    session: &mut GuardianSession,
    now: DateTime<Utc>,
    location: Option<Location>,
) -> GuardianResult<Vec<GuardianEvent>> {
    ensure_live(session)?;
    if let Some(location) = location {
        match location.validate() {
            Ok(()) => session.last_location = Some(location),
            Err(e) => warn!(session_id = %session.id, error = %e, "Dropping invalid SOS location"),
        }
    }

    session.status = GuardianStatus::Escalated;
    session.escalation_level = EscalationLevel::Emergency;
    session.escalated_at = Some(now);
    let location = session.last_location;
    Ok(vec![emit(
        session,
        GuardianEventKind::Sos,
        EscalationLevel::Emergency,
        now,
        location,
    )])
}

/// End the session. Contacts already alerted get an all-clear.
pub fn end(session: &mut GuardianSession, now: DateTime<Utc>) -> GuardianResult<Vec<GuardianEvent>> {
    ensure_live(session)?;

    let mut events = Vec::new();
    let previous_level = session.escalation_level;
    if previous_level.involves_contacts() {
        let location = session.last_location;
        events.push(emit(session, GuardianEventKind::AllClear, previous_level, now, location));
    }

    session.status = GuardianStatus::Ended;
    session.escalation_level = EscalationLevel::None;
    session.ended_at = Some(now);
    Ok(events)
}

fn ensure_live(session: &GuardianSession) -> GuardianResult<()> {
    if session.is_terminal() {
        return Err(GuardianError::SessionEnded(session.id.to_string()));
    }
    Ok(())
}

fn emit(
    session: &mut GuardianSession,
    kind: GuardianEventKind,
    level: EscalationLevel,
    at: DateTime<Utc>,
    location: Option<Location>,
) -> GuardianEvent {
    session.event_seq += 1;
    GuardianEvent {
        session_id: session.id.clone(),
        user_id: session.user_id.clone(),
        kind,
        level,
        at,
        seq: session.event_seq,
        location,
    }
}
