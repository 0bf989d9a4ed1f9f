//! Business logic services.

pub mod guardian;
pub mod guardian_monitor;
pub mod mfa;

pub use guardian::{GuardianService, SessionUpdate, TickSummary};
pub use guardian_monitor::{GuardianMonitor, MonitorHeartbeat};
pub use mfa::{MfaService, MfaSetup, MfaStatus, MfaVerification};
