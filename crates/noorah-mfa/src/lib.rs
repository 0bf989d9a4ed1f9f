//! TOTP multi-factor authentication.
//!
//! This crate provides:
//! - RFC 4648 base32 encoding for shared secrets
//! - Secret generation from the thread-local CSPRNG
//! - HOTP/TOTP generation and windowed verification with replay protection
//! - Hashed single-use backup codes
//! - `otpauth://` provisioning URIs

pub mod backup;
pub mod base32;
pub mod config;
pub mod error;
pub mod secret;
pub mod totp;
pub mod uri;

pub use backup::{consume_backup_code, hash_backup_code, BackupCodes, DEFAULT_BACKUP_CODE_COUNT};
pub use config::MfaConfig;
pub use error::{MfaError, MfaResult};
pub use secret::TotpSecret;
pub use totp::{hotp, Algorithm, Totp, TotpConfig};
pub use uri::provisioning_uri;
