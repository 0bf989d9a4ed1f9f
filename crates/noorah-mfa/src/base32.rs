//! RFC 4648 base32 codec.
//!
//! Authenticator apps exchange TOTP secrets as unpadded upper-case base32.
//! Decoding is lenient about the things users paste: lower case, spaces,
//! hyphen grouping and trailing `=` padding.

use crate::error::{MfaError, MfaResult};

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encode bytes as unpadded base32.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

/// Decode base32 text.
///
/// Whitespace and `-` are skipped. `=` is accepted only as trailing padding.
/// Leftover bits that do not fill a byte are dropped.
pub fn decode(input: &str) -> MfaResult<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    let mut seen_padding = false;

    for (position, ch) in input.chars().enumerate() {
        if ch.is_ascii_whitespace() || ch == '-' {
            continue;
        }
        if ch == '=' {
            seen_padding = true;
            continue;
        }
        if seen_padding {
            return Err(MfaError::InvalidBase32 { ch, position });
        }

        let value = match ch.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u32 - 'A' as u32,
            c @ '2'..='7' => c as u32 - '2' as u32 + 26,
            _ => return Err(MfaError::InvalidBase32 { ch, position }),
        };

        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4648_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "MY");
        assert_eq!(encode(b"fo"), "MZXQ");
        assert_eq!(encode(b"foo"), "MZXW6");
        assert_eq!(encode(b"foob"), "MZXW6YQ");
        assert_eq!(encode(b"fooba"), "MZXW6YTB");
        assert_eq!(encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn test_decode_padded_and_unpadded() {
        assert_eq!(decode("MZXW6YTBOI======").unwrap(), b"foobar");
        assert_eq!(decode("MZXW6YTBOI").unwrap(), b"foobar");
        assert_eq!(decode("MY======").unwrap(), b"f");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_is_lenient_about_formatting() {
        assert_eq!(decode("mzxw 6ytb-oi").unwrap(), b"foobar");
        assert_eq!(decode("JBSW Y3DP EHPK 3PXP").unwrap(), decode("JBSWY3DPEHPK3PXP").unwrap());
    }

    #[test]
    fn test_decode_rejects_invalid_characters() {
        match decode("MZXW1") {
            Err(MfaError::InvalidBase32 { ch, position }) => {
                assert_eq!(ch, '1');
                assert_eq!(position, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(decode("MZ=XW").is_err());
    }

    #[test]
    fn test_twenty_byte_secret_is_32_chars() {
        let encoded = encode(&[0xAB; 20]);
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode(&encoded).unwrap(), vec![0xAB; 20]);
    }
}
