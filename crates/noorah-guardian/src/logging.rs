//! Structured lifecycle logging for guardian sessions.

use noorah_models::{GuardianEvent, GuardianSession};
use tracing::{info, warn, Span};

use crate::notify::DispatchReport;

/// Logs session lifecycle lines with the session and user attached.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    user_id: String,
}

impl SessionLogger {
    pub fn new(session: &GuardianSession) -> Self {
        Self {
            session_id: session.id.to_string(),
            user_id: session.user_id.clone(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn started(&self, session: &GuardianSession) {
        info!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            booking_id = session.booking_id.as_deref().unwrap_or("-"),
            interval_secs = session.check_in_interval_secs,
            grace_secs = session.grace_period_secs,
            next_due = %session.next_check_in_due,
            "Guardian session started"
        );
    }

    pub fn checked_in(&self, session: &GuardianSession) {
        info!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            next_due = %session.next_check_in_due,
            "Guardian check-in received"
        );
    }

    /// Escalations and SOS go out at warn so they stand out in the log stream.
    pub fn event(&self, event: &GuardianEvent, report: &DispatchReport) {
        if event.level.involves_contacts() && event.kind != noorah_models::GuardianEventKind::AllClear {
            warn!(
                session_id = %self.session_id,
                user_id = %self.user_id,
                kind = %event.kind,
                level = %event.level,
                seq = event.seq,
                delivered = report.delivered,
                failed = report.failed,
                "Guardian escalation"
            );
        } else {
            info!(
                session_id = %self.session_id,
                user_id = %self.user_id,
                kind = %event.kind,
                level = %event.level,
                seq = event.seq,
                delivered = report.delivered,
                failed = report.failed,
                "Guardian event"
            );
        }
    }

    pub fn ended(&self, session: &GuardianSession) {
        info!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            missed_check_ins = session.missed_check_ins,
            "Guardian session ended"
        );
    }

    pub fn span(&self) -> Span {
        tracing::info_span!(
            "guardian_session",
            session_id = %self.session_id,
            user_id = %self.user_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardianConfig;
    use crate::state_machine::{start, StartSession};

    #[test]
    fn test_session_logger_fields() {
        let session = start(StartSession::new("sitter-9"), &GuardianConfig::default(), chrono::Utc::now()).unwrap();
        let logger = SessionLogger::new(&session);
        assert_eq!(logger.session_id(), session.id.as_str());
        assert_eq!(logger.user_id(), "sitter-9");
    }
}
