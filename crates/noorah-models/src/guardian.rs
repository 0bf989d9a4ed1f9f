//! Guardian Mode session models.
//!
//! A guardian session tracks a sitter (or parent) who has agreed to check in
//! on a fixed cadence while a booking is in progress. Missed check-ins escalate
//! through [`EscalationLevel`] until someone responds or the session ends.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::SessionId;

/// Lifecycle state of a guardian session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuardianStatus {
    /// Waiting for the next check-in
    #[default]
    Active,
    /// Check-in is due, still inside the grace period
    Overdue,
    /// Check-in was missed (or SOS raised); contacts are being notified
    Escalated,
    /// Session finished, no further timers run
    Ended,
}

impl GuardianStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardianStatus::Active => "active",
            GuardianStatus::Overdue => "overdue",
            GuardianStatus::Escalated => "escalated",
            GuardianStatus::Ended => "ended",
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, GuardianStatus::Ended)
    }
}

impl fmt::Display for GuardianStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How far a missed check-in has been escalated. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    #[default]
    None,
    /// Nudge the session owner
    Reminder,
    /// Primary emergency contacts
    PrimaryContacts,
    /// Every emergency contact
    AllContacts,
    /// Every contact plus the emergency-services hand-off
    Emergency,
}

impl EscalationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationLevel::None => "none",
            EscalationLevel::Reminder => "reminder",
            EscalationLevel::PrimaryContacts => "primary_contacts",
            EscalationLevel::AllContacts => "all_contacts",
            EscalationLevel::Emergency => "emergency",
        }
    }

    /// The next tier up, saturating at `Emergency`.
    pub fn next(&self) -> Self {
        match self {
            EscalationLevel::None => EscalationLevel::Reminder,
            EscalationLevel::Reminder => EscalationLevel::PrimaryContacts,
            EscalationLevel::PrimaryContacts => EscalationLevel::AllContacts,
            EscalationLevel::AllContacts | EscalationLevel::Emergency => EscalationLevel::Emergency,
        }
    }

    /// Whether emergency contacts have been contacted at this level.
    pub fn involves_contacts(&self) -> bool {
        *self >= EscalationLevel::PrimaryContacts
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A GPS fix attached to a check-in or SOS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Location {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub accuracy_m: Option<f64>,
}

/// A check-in submitted by the session owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CheckIn {
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub location: Option<Location>,
}

impl CheckIn {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            note: None,
            location: None,
        }
    }
}

/// Guardian session record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GuardianSession {
    pub id: SessionId,
    /// User who must check in
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    pub status: GuardianStatus,
    pub escalation_level: EscalationLevel,
    pub check_in_interval_secs: u64,
    pub grace_period_secs: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_in: Option<DateTime<Utc>>,
    pub next_check_in_due: DateTime<Utc>,
    /// Total check-ins missed over the session's lifetime
    pub missed_check_ins: u32,
    /// When the current escalation reached its present level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_location: Option<Location>,
    /// Sequence number for event ordering (monotonically increasing)
    pub event_seq: u64,
}

impl GuardianSession {
    pub fn check_in_interval(&self) -> Duration {
        Duration::seconds(self.check_in_interval_secs as i64)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::seconds(self.grace_period_secs as i64)
    }

    /// Instant after which a pending check-in counts as missed.
    pub fn missed_deadline(&self) -> DateTime<Utc> {
        self.next_check_in_due + self.grace_period()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// What happened in a guardian session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardianEventKind {
    /// Check-in is due; remind the owner
    CheckInReminder,
    /// Grace period elapsed without a check-in
    MissedCheckIn,
    /// Escalation moved to a new tier
    Escalate,
    /// Owner raised an SOS
    Sos,
    /// Owner checked in after contacts were alerted
    AllClear,
}

impl GuardianEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardianEventKind::CheckInReminder => "check_in_reminder",
            GuardianEventKind::MissedCheckIn => "missed_check_in",
            GuardianEventKind::Escalate => "escalate",
            GuardianEventKind::Sos => "sos",
            GuardianEventKind::AllClear => "all_clear",
        }
    }
}

impl fmt::Display for GuardianEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event emitted by a state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GuardianEvent {
    pub session_id: SessionId,
    pub user_id: String,
    pub kind: GuardianEventKind,
    /// Escalation tier that decides who hears about this event
    pub level: EscalationLevel,
    pub at: DateTime<Utc>,
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_ordering() {
        assert!(EscalationLevel::None < EscalationLevel::Reminder);
        assert!(EscalationLevel::PrimaryContacts < EscalationLevel::Emergency);
        assert!(!EscalationLevel::Reminder.involves_contacts());
        assert!(EscalationLevel::AllContacts.involves_contacts());
    }

    #[test]
    fn test_escalation_next_saturates() {
        assert_eq!(EscalationLevel::None.next(), EscalationLevel::Reminder);
        assert_eq!(EscalationLevel::AllContacts.next(), EscalationLevel::Emergency);
        assert_eq!(EscalationLevel::Emergency.next(), EscalationLevel::Emergency);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&GuardianStatus::Overdue).unwrap();
        assert_eq!(json, "\"overdue\"");
        assert!(GuardianStatus::Ended.is_terminal());
        assert!(!GuardianStatus::Escalated.is_terminal());
    }

    #[test]
    fn test_location_validation() {
        let ok = Location {
            latitude: 47.6,
            longitude: -122.3,
            accuracy_m: Some(12.0),
        };
        assert!(ok.validate().is_ok());

        let bad = Location {
            latitude: 95.0,
            longitude: 0.0,
            accuracy_m: None,
        };
        assert!(bad.validate().is_err());

        let check_in = CheckIn {
            at: Utc::now(),
            note: None,
            location: Some(bad),
        };
        assert!(check_in.validate().is_err());
    }
}
