//! MFA configuration.

use std::time::Duration;

use crate::backup::DEFAULT_BACKUP_CODE_COUNT;
use crate::totp::{Algorithm, TotpConfig, DEFAULT_DIGITS, DEFAULT_PERIOD_SECS, DEFAULT_SKEW_STEPS, MAX_SKEW_STEPS};

const MAX_PERIOD_SECS: u64 = 300;
const MAX_BACKUP_CODE_COUNT: usize = 20;
const MAX_FAILED_ATTEMPTS_LIMIT: u32 = 100;
/// One day.
const MAX_LOCKOUT_SECS: u64 = 86_400;

/// MFA configuration.
#[derive(Debug, Clone)]
pub struct MfaConfig {
    /// Issuer shown in authenticator apps
    pub issuer: String,
    /// TOTP parameters
    pub totp: TotpConfig,
    /// Backup codes issued per set
    pub backup_code_count: usize,
    /// Consecutive failures before verification is locked
    pub max_failed_attempts: u32,
    /// How long a lockout lasts
    pub lockout: Duration,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            issuer: "Noorah".to_string(),
            totp: TotpConfig::default(),
            backup_code_count: DEFAULT_BACKUP_CODE_COUNT,
            max_failed_attempts: 5,
            lockout: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl MfaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Out-of-range values are clamped or
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let algorithm = lookup("MFA_ALGORITHM")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            issuer: lookup("MFA_ISSUER").unwrap_or_else(|| "Noorah".to_string()),
            totp: TotpConfig {
                digits: parsed("MFA_DIGITS")
                    .filter(|d| (6..=8).contains(d))
                    .map(|d| d as u32)
                    .unwrap_or(DEFAULT_DIGITS),
                period_secs: parsed("MFA_PERIOD_SECS")
                    .filter(|p| (1..=MAX_PERIOD_SECS).contains(p))
                    .unwrap_or(DEFAULT_PERIOD_SECS),
                skew: parsed("MFA_SKEW_STEPS")
                    .map(|s| s.min(MAX_SKEW_STEPS))
                    .unwrap_or(DEFAULT_SKEW_STEPS),
                algorithm,
            },
            backup_code_count: parsed("MFA_BACKUP_CODE_COUNT")
                .map(|n| n.clamp(1, MAX_BACKUP_CODE_COUNT as u64) as usize)
                .unwrap_or(DEFAULT_BACKUP_CODE_COUNT),
            max_failed_attempts: parsed("MFA_MAX_FAILED_ATTEMPTS")
                .map(|n| n.clamp(1, MAX_FAILED_ATTEMPTS_LIMIT as u64) as u32)
                .unwrap_or(5),
            lockout: Duration::from_secs(
                parsed("MFA_LOCKOUT_SECS")
                    .map(|secs| secs.clamp(1, MAX_LOCKOUT_SECS))
                    .unwrap_or(300),
            ),
        }
    }
}
