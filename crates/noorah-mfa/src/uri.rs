//! `otpauth://` provisioning URIs (the payload of the enrollment QR code).

use crate::error::{MfaError, MfaResult};
use crate::secret::TotpSecret;
use crate::totp::TotpConfig;

/// Build the key URI understood by authenticator apps.
pub fn provisioning_uri(
    secret: &TotpSecret,
    config: &TotpConfig,
    issuer: &str,
    account: &str,
) -> MfaResult<String> {
    let issuer = issuer.trim();
    let account = account.trim();

    if issuer.is_empty() || account.is_empty() {
        return Err(MfaError::invalid_label("issuer and account must not be empty"));
    }
    if issuer.contains(':') || account.contains(':') {
        return Err(MfaError::invalid_label("issuer and account must not contain ':'"));
    }

    let issuer_enc = urlencoding::encode(issuer);
    let account_enc = urlencoding::encode(account);

    Ok(format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm={algorithm}&digits={digits}&period={period}",
        issuer = issuer_enc,
        account = account_enc,
        secret = secret.to_base32(),
        algorithm = config.algorithm.as_str(),
        digits = config.digits,
        period = config.period_secs,
    ))
}
