//! Shared data models for the Noorah safety backend.
//!
//! This crate provides Serde-serializable types for:
//! - MFA enrollment records and backup code hashes
//! - Guardian Mode sessions, check-ins and events
//! - Emergency contacts and notification payloads

pub mod contact;
pub mod guardian;
pub mod ids;
pub mod mfa;
pub mod notification;

// Re-export common types
pub use contact::{EmergencyContact, NotificationChannel, MAX_EMERGENCY_CONTACTS, PRIMARY_PRIORITY};
pub use guardian::{
    CheckIn, EscalationLevel, GuardianEvent, GuardianEventKind, GuardianSession, GuardianStatus, Location,
};
pub use ids::{ContactId, SessionId};
pub use mfa::{BackupCodeRecord, MfaEnrollment, MfaMethod};
pub use notification::{Notification, Recipient};
