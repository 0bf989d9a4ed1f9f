//! Shared-secret generation.

use std::fmt;

use rand::RngCore;

use crate::base32;
use crate::error::{MfaError, MfaResult};

/// Default secret size (160 bits, as recommended by RFC 4226).
pub const DEFAULT_SECRET_BYTES: usize = 20;

/// Smallest secret we accept (128 bits).
pub const MIN_SECRET_BYTES: usize = 16;

/// Raw TOTP key material.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(Vec<u8>);

impl TotpSecret {
    /// Generate a fresh 160-bit secret.
    pub fn generate() -> Self {
        Self::random(DEFAULT_SECRET_BYTES)
    }

    /// Generate a secret of `len` bytes.
    pub fn generate_with_len(len: usize) -> MfaResult<Self> {
        if len < MIN_SECRET_BYTES {
            return Err(MfaError::SecretTooShort(len));
        }
        Ok(Self::random(len))
    }

    fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a base32 secret as shown to (or typed by) the user.
    pub fn from_base32(encoded: &str) -> MfaResult<Self> {
        let bytes = base32::decode(encoded)?;
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(MfaError::SecretTooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn to_base32(&self) -> String {
        base32::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TotpSecret([REDACTED; {}])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_length() {
        let secret = TotpSecret::generate();
        assert_eq!(secret.len(), DEFAULT_SECRET_BYTES);
        assert_eq!(secret.to_base32().len(), 32);
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(TotpSecret::generate(), TotpSecret::generate());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            TotpSecret::generate_with_len(8),
            Err(MfaError::SecretTooShort(8))
        ));
        assert!(TotpSecret::from_base32("MZXW6YTBOI").is_err());
    }

    #[test]
    fn test_base32_round_trip() {
        let secret = TotpSecret::generate_with_len(32).unwrap();
        let parsed = TotpSecret::from_base32(&secret.to_base32().to_lowercase()).unwrap();
        assert_eq!(parsed, secret);
    }

    #[test]
    fn test_debug_redacts_key() {
        let secret = TotpSecret::from_bytes(b"12345678901234567890".to_vec());
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("49"));
        assert!(debug.contains("REDACTED"));
    }
}
