//! HOTP (RFC 4226) and TOTP (RFC 6238).

use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{MfaError, MfaResult};
use crate::secret::TotpSecret;

/// Default code length.
pub const DEFAULT_DIGITS: u32 = 6;

/// Default time step in seconds.
pub const DEFAULT_PERIOD_SECS: u64 = 30;

/// Steps accepted either side of the current one.
pub const DEFAULT_SKEW_STEPS: u64 = 1;

/// Upper bound on skew tolerance.
pub const MAX_SKEW_STEPS: u64 = 10;

/// HMAC hash function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
}

impl Algorithm {
    /// Name as used in `otpauth://` URIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
        }
    }

    fn mac(&self, key: &[u8], message: &[u8]) -> MfaResult<Vec<u8>> {
        match self {
            Algorithm::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key)
                    .map_err(|e| MfaError::Hmac(e.to_string()))?;
                mac.update(message);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            Algorithm::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key)
                    .map_err(|e| MfaError::Hmac(e.to_string()))?;
                mac.update(message);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }
}

impl FromStr for Algorithm {
    type Err = MfaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHA1" => Ok(Algorithm::Sha1),
            "SHA256" => Ok(Algorithm::Sha256),
            _ => Err(MfaError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// TOTP parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpConfig {
    pub digits: u32,
    pub period_secs: u64,
    /// Clock-skew tolerance in whole steps
    pub skew: u64,
    pub algorithm: Algorithm,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            digits: DEFAULT_DIGITS,
            period_secs: DEFAULT_PERIOD_SECS,
            skew: DEFAULT_SKEW_STEPS,
            algorithm: Algorithm::Sha1,
        }
    }
}

impl TotpConfig {
    pub fn validate(&self) -> MfaResult<()> {
        if !(6..=8).contains(&self.digits) {
            return Err(MfaError::InvalidDigits(self.digits));
        }
        if self.period_secs == 0 {
            return Err(MfaError::InvalidPeriod(self.period_secs));
        }
        if self.skew > MAX_SKEW_STEPS {
            return Err(MfaError::InvalidSkew(self.skew));
        }
        Ok(())
    }
}

/// Compute an HOTP value for `counter`.
pub fn hotp(key: &[u8], counter: u64, digits: u32, algorithm: Algorithm) -> MfaResult<String> {
    if !(6..=8).contains(&digits) {
        return Err(MfaError::InvalidDigits(digits));
    }

    let hash = algorithm.mac(key, &counter.to_be_bytes())?;

    // Dynamic truncation
    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(hash[offset] & 0x7f) << 24)
        | (u32::from(hash[offset + 1]) << 16)
        | (u32::from(hash[offset + 2]) << 8)
        | u32::from(hash[offset + 3]);

    let code = binary % 10u32.pow(digits);
    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// A TOTP generator/verifier bound to one secret.
#[derive(Debug, Clone)]
pub struct Totp {
    secret: TotpSecret,
    config: TotpConfig,
}

impl Totp {
    pub fn new(secret: TotpSecret, config: TotpConfig) -> MfaResult<Self> {
        config.validate()?;
        Ok(Self { secret, config })
    }

    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    /// Time step containing `unix_secs`.
    pub fn time_step(&self, unix_secs: u64) -> u64 {
        unix_secs / self.config.period_secs
    }

    /// Seconds until the current code rolls over.
    pub fn seconds_remaining(&self, unix_secs: u64) -> u64 {
        self.config.period_secs - (unix_secs % self.config.period_secs)
    }

    /// Code for a specific time step.
    pub fn generate_for_step(&self, step: u64) -> MfaResult<String> {
        hotp(self.secret.as_bytes(), step, self.config.digits, self.config.algorithm)
    }

    /// Code valid at `unix_secs`.
    pub fn generate_at(&self, unix_secs: u64) -> MfaResult<String> {
        self.generate_for_step(self.time_step(unix_secs))
    }

    /// Verify a user-supplied code.
    ///
    /// Returns the matched time step, which the caller must persist as the new
    /// `last_used_step`. Steps at or before `last_used_step` never match.
    pub fn verify(&self, code: &str, unix_secs: u64, last_used_step: Option<u64>) -> MfaResult<Option<u64>> {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        if code.len() != self.config.digits as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }

        let current = self.time_step(unix_secs);
        for step in candidate_steps(current, self.config.skew) {
            if last_used_step.map_or(false, |last| step <= last) {
                continue;
            }
            let expected = self.generate_for_step(step)?;
            if bool::from(expected.as_bytes().ct_eq(code.as_bytes())) {
                if step != current {
                    debug!(drift = step as i64 - current as i64, "TOTP matched outside current step");
                }
                return Ok(Some(step));
            }
        }

        Ok(None)
    }
}

/// Steps to try, nearest first: current, -1, +1, -2, +2, ...
fn candidate_steps(current: u64, skew: u64) -> Vec<u64> {
    let skew = skew.min(MAX_SKEW_STEPS);
    let mut steps = Vec::with_capacity(skew as usize * 2 + 1);
    steps.push(current);
    for distance in 1..=skew {
        if let Some(earlier) = current.checked_sub(distance) {
            steps.push(earlier);
        }
        if let Some(later) = current.checked_add(distance) {
            steps.push(later);
        }
    }
    steps
}
