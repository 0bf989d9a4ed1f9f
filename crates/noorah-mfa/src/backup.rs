//! Single-use backup codes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use noorah_models::BackupCodeRecord;

/// Default number of codes issued per set.
pub const DEFAULT_BACKUP_CODE_COUNT: usize = 10;

/// Characters used in codes. Excludes 0/o, 1/l/i.
const CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Characters in each half of `xxxx-xxxx`.
const GROUP_LEN: usize = 4;

/// A freshly generated set of backup codes.
///
/// `codes` is shown to the user exactly once; only `records` is persisted.
#[derive(Debug, Clone)]
pub struct BackupCodes {
    pub codes: Vec<String>,
    pub records: Vec<BackupCodeRecord>,
}

impl BackupCodes {
    /// Generate `count` codes.
    pub fn generate(count: usize) -> Self {
        let mut rng = rand::rng();
        let codes: Vec<String> = (0..count)
            .map(|_| {
                let mut code = String::with_capacity(GROUP_LEN * 2 + 1);
                for i in 0..GROUP_LEN * 2 {
                    if i == GROUP_LEN {
                        code.push('-');
                    }
                    let idx = rng.random_range(0..CODE_ALPHABET.len());
                    code.push(CODE_ALPHABET[idx] as char);
                }
                code
            })
            .collect();

        let records = codes
            .iter()
            .map(|c| BackupCodeRecord::new(hash_backup_code(c)))
            .collect();

        Self { codes, records }
    }
}

/// Canonical form of a code: lower case, no separators.
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Hash a code for storage.
pub fn hash_backup_code(code: &str) -> String {
    let digest = Sha256::digest(normalize_backup_code(code).as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Consume `code` if it matches an unused record.
///
/// Returns `true` exactly once per code.
pub fn consume_backup_code(records: &mut [BackupCodeRecord], code: &str, now: DateTime<Utc>) -> bool {
    if normalize_backup_code(code).len() != GROUP_LEN * 2 {
        return false;
    }
    let candidate = hash_backup_code(code);

    for record in records.iter_mut() {
        if record.is_used() {
            continue;
        }
        if bool::from(record.hash.as_bytes().ct_eq(candidate.as_bytes())) {
            record.used_at = Some(now);
            return true;
        }
    }
    false
}

/// Count codes that have not been used.
pub fn remaining(records: &[BackupCodeRecord]) -> usize {
    records.iter().filter(|r| !r.is_used()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        let set = BackupCodes::generate(DEFAULT_BACKUP_CODE_COUNT);
        assert_eq!(set.codes.len(), 10);
        assert_eq!(set.records.len(), 10);
        for code in &set.codes {
            assert_eq!(code.len(), 9);
            assert_eq!(&code[4..5], "-");
            assert!(code
                .chars()
                .filter(|c| *c != '-')
                .all(|c| CODE_ALPHABET.contains(&(c as u8))));
        }
    }

    #[test]
    fn test_records_do_not_contain_plain_codes() {
        let set = BackupCodes::generate(3);
        for (code, record) in set.codes.iter().zip(&set.records) {
            assert_ne!(&record.hash, code);
            assert_eq!(record.hash, hash_backup_code(code));
        }
    }

    #[test]
    fn test_consume_once() {
        let set = BackupCodes::generate(3);
        let mut records = set.records.clone();
        let now = Utc::now();

        assert!(consume_backup_code(&mut records, &set.codes[1], now));
        assert_eq!(remaining(&records), 2);
        assert_eq!(records[1].used_at, Some(now));

        assert!(!consume_backup_code(&mut records, &set.codes[1], now));
        assert_eq!(remaining(&records), 2);
    }

    #[test]
    fn test_consume_normalizes_input() {
        let set = BackupCodes::generate(1);
        let mut records = set.records.clone();
        let typed = format!(" {} ", set.codes[0].replace('-', "").to_uppercase());
        assert!(consume_backup_code(&mut records, &typed, Utc::now()));
    }

    #[test]
    fn test_consume_unknown_code() {
        let set = BackupCodes::generate(2);
        let mut records = set.records.clone();
        assert!(!consume_backup_code(&mut records, "zzzz-zzzz", Utc::now()));
        assert!(!consume_backup_code(&mut records, "123456", Utc::now()));
        assert_eq!(remaining(&records), 2);
    }
}
