//! Persisted MFA enrollment state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a user proved their second factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MfaMethod {
    /// Time-based one-time password from an authenticator app
    Totp,
    /// Single-use recovery code
    BackupCode,
}

impl MfaMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MfaMethod::Totp => "totp",
            MfaMethod::BackupCode => "backup_code",
        }
    }
}

impl fmt::Display for MfaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hashed backup code. The plain code is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BackupCodeRecord {
    /// SHA-256 of the normalized code, base64url without padding
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl BackupCodeRecord {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            used_at: None,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// MFA state for one user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MfaEnrollment {
    pub user_id: String,
    /// Active secret (base32). `None` until enrollment is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Secret issued by setup but not yet confirmed with a valid code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_at: Option<DateTime<Utc>>,
    /// Highest TOTP time step accepted so far (replay protection).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_step: Option<u64>,
    #[serde(default)]
    pub backup_codes: Vec<BackupCodeRecord>,
    /// Consecutive failed verifications.
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl MfaEnrollment {
    /// Create an empty (not enrolled) record.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            secret: None,
            pending_secret: None,
            enabled: false,
            enabled_at: None,
            last_used_step: None,
            backup_codes: Vec::new(),
            failed_attempts: 0,
            locked_until: None,
            updated_at: Utc::now(),
        }
    }

    /// Number of backup codes not yet consumed.
    pub fn remaining_backup_codes(&self) -> usize {
        self.backup_codes.iter().filter(|c| !c.is_used()).count()
    }

    /// Check whether verification is currently locked out.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map_or(false, |until| now < until)
    }

    /// Drop all enrollment state (disable MFA).
    pub fn reset(&mut self) {
        self.secret = None;
        self.pending_secret = None;
        self.enabled = false;
        self.enabled_at = None;
        self.last_used_step = None;
        self.backup_codes.clear();
        self.failed_attempts = 0;
        self.locked_until = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_backup_codes() {
        let mut enrollment = MfaEnrollment::new("user-1");
        enrollment.backup_codes = vec![
            BackupCodeRecord::new("a"),
            BackupCodeRecord::new("b"),
            BackupCodeRecord::new("c"),
        ];
        enrollment.backup_codes[1].used_at = Some(Utc::now());
        assert_eq!(enrollment.remaining_backup_codes(), 2);
    }

    #[test]
    fn test_lockout_window() {
        let now = Utc::now();
        let mut enrollment = MfaEnrollment::new("user-1");
        assert!(!enrollment.is_locked(now));

        enrollment.locked_until = Some(now + chrono::Duration::minutes(5));
        assert!(enrollment.is_locked(now));
        assert!(!enrollment.is_locked(now + chrono::Duration::minutes(6)));
    }

    #[test]
    fn test_reset_clears_secret() {
        let mut enrollment = MfaEnrollment::new("user-1");
        enrollment.secret = Some("JBSWY3DPEHPK3PXP".to_string());
        enrollment.enabled = true;
        enrollment.last_used_step = Some(42);
        enrollment.reset();
        assert!(!enrollment.enabled);
        assert!(enrollment.secret.is_none());
        assert!(enrollment.last_used_step.is_none());
    }
}
