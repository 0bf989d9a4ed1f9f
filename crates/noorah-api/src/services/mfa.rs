//! MFA enrollment and verification service.
//!
//! Enrollment is two-step: `setup` issues a pending secret, `enable` confirms
//! it with a first valid code and hands out backup codes. Every verification
//! path shares the same failure counter and lockout.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use noorah_mfa::{consume_backup_code, provisioning_uri, BackupCodes, MfaConfig, Totp, TotpSecret};
use noorah_models::{MfaEnrollment, MfaMethod};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Enrollment status returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct MfaStatus {
    pub enabled: bool,
    pub pending_setup: bool,
    pub remaining_backup_codes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
}

/// Material for the authenticator app.
#[derive(Debug, Clone, Serialize)]
pub struct MfaSetup {
    /// Base32 secret for manual entry
    pub secret: String,
    pub otpauth_uri: String,
    pub algorithm: &'static str,
    pub digits: u32,
    pub period: u64,
}

/// Result of a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct MfaVerification {
    pub method: MfaMethod,
    pub remaining_backup_codes: usize,
}

/// MFA service over an in-memory enrollment store.
#[derive(Clone)]
pub struct MfaService {
    config: MfaConfig,
    enrollments: Arc<RwLock<HashMap<String, MfaEnrollment>>>,
}

impl MfaService {
    pub fn new(config: MfaConfig) -> Self {
        Self {
            config,
            enrollments: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &MfaConfig {
        &self.config
    }

    /// Current enrollment state.
    pub async fn status(&self, uid: &str, now: DateTime<Utc>) -> MfaStatus {
        let enrollments = self.enrollments.read().await;
        match enrollments.get(uid) {
            Some(e) => MfaStatus {
                enabled: e.enabled,
                pending_setup: e.pending_secret.is_some(),
                remaining_backup_codes: e.remaining_backup_codes(),
                locked_until: e.locked_until.filter(|_| e.is_locked(now)),
            },
            None => MfaStatus {
                enabled: false,
                pending_setup: false,
                remaining_backup_codes: 0,
                locked_until: None,
            },
        }
    }

    /// Whether the user must present a second factor.
    pub async fn is_enabled(&self, uid: &str) -> bool {
        self.enrollments.read().await.get(uid).map_or(false, |e| e.enabled)
    }

    /// Issue a pending secret. Calling again replaces the pending secret.
    pub async fn setup(&self, uid: &str, account: &str) -> ApiResult<MfaSetup> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .entry(uid.to_string())
            .or_insert_with(|| MfaEnrollment::new(uid));

        if enrollment.enabled {
            return Err(ApiError::conflict("MFA is already enabled"));
        }

        let secret = TotpSecret::generate();
        let otpauth_uri = provisioning_uri(&secret, &self.config.totp, &self.config.issuer, account)?;
        let encoded = secret.to_base32();

        enrollment.pending_secret = Some(encoded.clone());
        enrollment.updated_at = Utc::now();

        info!(user_id = %uid, "MFA setup started");

        Ok(MfaSetup {
            secret: encoded,
            otpauth_uri,
            algorithm: self.config.totp.algorithm.as_str(),
            digits: self.config.totp.digits,
            period: self.config.totp.period_secs,
        })
    }

    /// Confirm the pending secret with a code. Returns the plain backup codes,
    /// which are never retrievable again.
    pub async fn enable(&self, uid: &str, code: &str, now: DateTime<Utc>) -> ApiResult<Vec<String>> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .get_mut(uid)
            .ok_or_else(|| ApiError::bad_request("Call MFA setup first"))?;

        if enrollment.enabled {
            return Err(ApiError::conflict("MFA is already enabled"));
        }
        let pending = enrollment
            .pending_secret
            .clone()
            .ok_or_else(|| ApiError::bad_request("Call MFA setup first"))?;

        self.ensure_unlocked(enrollment, now)?;

        let step = self.match_totp(&pending, code, now, None)?;
        let Some(step) = step else {
            metrics::record_mfa_verification("totp", false);
            return Err(self.record_failure(enrollment, now));
        };

        let backup = BackupCodes::generate(self.config.backup_code_count);
        enrollment.secret = Some(pending);
        enrollment.pending_secret = None;
        enrollment.enabled = true;
        enrollment.enabled_at = Some(now);
        enrollment.last_used_step = Some(step);
        enrollment.backup_codes = backup.records;
        clear_failures(enrollment, now);

        metrics::record_mfa_verification("totp", true);
        metrics::record_mfa_enrollment("enabled");
        info!(user_id = %uid, "MFA enabled");

        Ok(backup.codes)
    }

    /// Check a TOTP or backup code for an enrolled user.
    pub async fn verify(&self, uid: &str, code: &str, now: DateTime<Utc>) -> ApiResult<MfaVerification> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrolled(&mut enrollments, uid)?;
        self.verify_enrolled(enrollment, code, now)
    }

    /// Turn MFA off. Requires a valid code.
    pub async fn disable(&self, uid: &str, code: &str, now: DateTime<Utc>) -> ApiResult<()> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrolled(&mut enrollments, uid)?;
        self.verify_enrolled(enrollment, code, now)?;

        enrollment.reset();
        metrics::record_mfa_enrollment("disabled");
        info!(user_id = %uid, "MFA disabled");
        Ok(())
    }

    /// Replace all backup codes. Requires a valid code.
    pub async fn regenerate_backup_codes(&self, uid: &str, code: &str, now: DateTime<Utc>) -> ApiResult<Vec<String>> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrolled(&mut enrollments, uid)?;
        self.verify_enrolled(enrollment, code, now)?;

        let backup = BackupCodes::generate(self.config.backup_code_count);
        enrollment.backup_codes = backup.records;
        enrollment.updated_at = now;

        metrics::record_mfa_enrollment("codes_regenerated");
        info!(user_id = %uid, "MFA backup codes regenerated");
        Ok(backup.codes)
    }

    fn verify_enrolled(
        &self,
        enrollment: &mut MfaEnrollment,
        code: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<MfaVerification> {
        self.ensure_unlocked(enrollment, now)?;

        let secret = enrollment
            .secret
            .clone()
            .ok_or_else(|| ApiError::internal("Enabled MFA enrollment has no secret"))?;

        if let Some(step) = self.match_totp(&secret, code, now, enrollment.last_used_step)? {
            enrollment.last_used_step = Some(step);
            clear_failures(enrollment, now);
            metrics::record_mfa_verification(MfaMethod::Totp.as_str(), true);
            return Ok(MfaVerification {
                method: MfaMethod::Totp,
                remaining_backup_codes: enrollment.remaining_backup_codes(),
            });
        }

        if consume_backup_code(&mut enrollment.backup_codes, code, now) {
            clear_failures(enrollment, now);
            let remaining = enrollment.remaining_backup_codes();
            metrics::record_mfa_verification(MfaMethod::BackupCode.as_str(), true);
            info!(user_id = %enrollment.user_id, remaining, "Backup code used");
            return Ok(MfaVerification {
                method: MfaMethod::BackupCode,
                remaining_backup_codes: remaining,
            });
        }

        metrics::record_mfa_verification("none", false);
        Err(self.record_failure(enrollment, now))
    }

    fn match_totp(
        &self,
        secret_b32: &str,
        code: &str,
        now: DateTime<Utc>,
        last_used_step: Option<u64>,
    ) -> ApiResult<Option<u64>> {
        let secret = TotpSecret::from_base32(secret_b32)?;
        let totp = Totp::new(secret, self.config.totp)?;
        let unix_secs = u64::try_from(now.timestamp()).unwrap_or(0);
        Ok(totp.verify(code, unix_secs, last_used_step)?)
    }

    fn ensure_unlocked(&self, enrollment: &mut MfaEnrollment, now: DateTime<Utc>) -> ApiResult<()> {
        match enrollment.locked_until {
            Some(until) if now < until => Err(ApiError::Locked {
                retry_after_secs: (until - now).num_seconds().max(1) as u64,
            }),
            Some(_) => {
                // Lockout expired
                enrollment.locked_until = None;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Count a failed attempt and return the error to surface.
    fn record_failure(&self, enrollment: &mut MfaEnrollment, now: DateTime<Utc>) -> ApiError {
        enrollment.failed_attempts += 1;
        enrollment.updated_at = now;

        if enrollment.failed_attempts >= self.config.max_failed_attempts {
            let lockout = chrono::Duration::from_std(self.config.lockout).unwrap_or(chrono::Duration::minutes(5));
            enrollment.locked_until = Some(now + lockout);
            enrollment.failed_attempts = 0;
            metrics::record_mfa_lockout();
            warn!(
                user_id = %enrollment.user_id,
                lockout_secs = self.config.lockout.as_secs(),
                "MFA locked after repeated failures"
            );
            return ApiError::Locked {
                retry_after_secs: self.config.lockout.as_secs().max(1),
            };
        }

        ApiError::InvalidCode
    }
}

fn enrolled<'a>(
    enrollments: &'a mut HashMap<String, MfaEnrollment>,
    uid: &str,
) -> ApiResult<&'a mut MfaEnrollment> {
    enrollments
        .get_mut(uid)
        .filter(|e| e.enabled)
        .ok_or_else(|| ApiError::bad_request("MFA is not enabled"))
}

fn clear_failures(enrollment: &mut MfaEnrollment, now: DateTime<Utc>) {
    enrollment.failed_attempts = 0;
    enrollment.locked_until = None;
    enrollment.updated_at = now;
}
