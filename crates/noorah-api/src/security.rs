//! Security utilities for input validation and sanitization.
//!
//! This module provides:
//! - Webhook URL validation (SSRF protection for contact-supplied URLs)
//! - Free-text sanitization for notes and labels

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::{Host, Url};

/// Maximum URL length.
const MAX_URL_LENGTH: usize = 2048;

/// Maximum check-in note length.
pub const MAX_NOTE_LENGTH: usize = 500;

/// DNS names a contact webhook may never target. Literal addresses are
/// checked by [`is_blocked_ip`].
static BLOCKED_HOSTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^localhost$",
        r"\.localhost$",
        // Cloud metadata endpoints
        r"^metadata\.",
        r"^metadata\.google\.internal$",
        r"\.internal$",
        r"\.local$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Why a webhook URL was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum UrlRejection {
    TooLong,
    Invalid(String),
    InsecureScheme,
    Blocked,
}

impl std::fmt::Display for UrlRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLong => write!(f, "URL exceeds maximum length of {} characters", MAX_URL_LENGTH),
            Self::Invalid(msg) => write!(f, "{}", msg),
            Self::InsecureScheme => write!(f, "Webhook URLs must use HTTPS"),
            Self::Blocked => write!(f, "URL appears to target an internal or restricted endpoint"),
        }
    }
}

/// Validate a contact-supplied webhook URL.
///
/// `allow_http` permits plain HTTP (development only). Internal and metadata
/// hosts are always refused.
pub fn validate_webhook_url(url: &str, allow_http: bool) -> Result<String, UrlRejection> {
    if url.len() > MAX_URL_LENGTH {
        return Err(UrlRejection::TooLong);
    }

    let url = url.trim();
    if url.is_empty() {
        return Err(UrlRejection::Invalid("URL cannot be empty".to_string()));
    }

    let parsed = Url::parse(url).map_err(|e| UrlRejection::Invalid(format!("Invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => return Err(UrlRejection::InsecureScheme),
        scheme => {
            return Err(UrlRejection::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            )))
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| UrlRejection::Invalid("URL must have a valid host".to_string()))?;

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(UrlRejection::Invalid("URL must not embed credentials".to_string()));
    }

    let blocked = match host {
        Host::Domain(name) => {
            let name = name.to_lowercase();
            BLOCKED_HOSTS.iter().any(|p| p.is_match(&name))
        }
        Host::Ipv4(addr) => is_blocked_ip(IpAddr::V4(addr)),
        Host::Ipv6(addr) => is_blocked_ip(IpAddr::V6(addr)),
    };
    if blocked {
        warn!(host = %host, "Blocked webhook host");
        return Err(UrlRejection::Blocked);
    }

    Ok(parsed.to_string())
}

/// Whether a literal address points at loopback, private, link-local or
/// otherwise non-routable space.
pub fn is_blocked_ip(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(addr: Ipv4Addr) -> bool {
    let [a, b, ..] = addr.octets();
    addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
        || addr.is_multicast()
        // 0.0.0.0/8 and carrier-grade NAT 100.64.0.0/10
        || a == 0
        || (a == 100 && (64..128).contains(&b))
}

fn is_blocked_ipv6(addr: Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        || addr.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

/// Strip control characters and cap the length of free text.
pub fn sanitize_note(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .take(MAX_NOTE_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_public_https() {
        assert_eq!(
            validate_webhook_url("https://hooks.example.com/noorah", false),
            Ok("https://hooks.example.com/noorah".to_string())
        );
    }

    #[test]
    fn test_http_only_when_allowed() {
        assert_eq!(
            validate_webhook_url("http://hooks.example.com/x", false),
            Err(UrlRejection::InsecureScheme)
        );
        assert!(validate_webhook_url("http://hooks.example.com/x", true).is_ok());
    }

    #[test]
    fn test_blocks_internal_hosts() {
        for url in [
            "https://127.0.0.1/hook",
            "https://localhost/hook",
            "https://10.0.0.5/hook",
            "https://172.20.1.1/hook",
            "https://192.168.1.1/hook",
            "https://169.254.169.254/latest/meta-data/",
            "https://[::1]/hook",
            "https://metadata.google.internal/computeMetadata",
            "https://0.0.0.0/hook",
        ] {
            assert_eq!(validate_webhook_url(url, true), Err(UrlRejection::Blocked), "{url}");
        }
    }

    #[test]
    fn test_blocks_ipv6_literals_and_mapped_v4() {
        for url in [
            "https://[::ffff:127.0.0.1]/hook",
            "https://[::ffff:169.254.169.254]/latest/meta-data/",
            "https://[::ffff:10.0.0.1]/hook",
            "https://[::ffff:192.168.0.1]/hook",
            "https://[::]/hook",
            "https://[fd12:3456::1]/hook",
            "https://[fe80::1]/hook",
            "http://2130706433/hook",
        ] {
            assert_eq!(validate_webhook_url(url, true), Err(UrlRejection::Blocked), "{url}");
        }
    }

    #[test]
    fn test_accepts_public_ip_literals() {
        assert!(validate_webhook_url("https://93.184.216.34/hook", false).is_ok());
        assert!(validate_webhook_url("https://[2606:2800:220:1::1]/hook", false).is_ok());
        assert!(validate_webhook_url("https://[::ffff:93.184.216.34]/hook", false).is_ok());
    }

    #[test]
    fn test_rejects_bad_schemes_and_credentials() {
        assert!(matches!(
            validate_webhook_url("ftp://example.com/x", true),
            Err(UrlRejection::Invalid(_))
        ));
        assert!(matches!(
            validate_webhook_url("javascript:alert(1)", true),
            Err(UrlRejection::Invalid(_))
        ));
        assert!(matches!(
            validate_webhook_url("https://user:pw@example.com/x", true),
            Err(UrlRejection::Invalid(_))
        ));
    }

    #[test]
    fn test_sanitize_note() {
        assert_eq!(sanitize_note("  all good\u{0007} here  "), "all good here");
        assert_eq!(sanitize_note(&"a".repeat(900)).len(), MAX_NOTE_LENGTH);
    }
}
