//! Guardian Mode: timed safety check-ins with tiered escalation.
//!
//! This crate provides:
//! - A pure, clock-injected session state machine
//! - Escalation policy deciding who hears about each event
//! - Notification fan-out over pluggable notifiers
//! - An in-memory session and contact registry

pub mod config;
pub mod error;
pub mod escalation;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod registry;
pub mod retry;
pub mod state_machine;

pub use config::{GuardianConfig, MAX_CHECK_IN_INTERVAL, MIN_CHECK_IN_INTERVAL};
pub use error::{GuardianError, GuardianResult};
pub use escalation::{Audience, EscalationPolicy};
pub use logging::SessionLogger;
pub use notify::{DispatchReport, LogNotifier, NotificationDispatcher, Notifier, RecordingNotifier, WebhookNotifier};
pub use registry::SessionRegistry;
pub use retry::Backoff;
pub use state_machine::StartSession;
