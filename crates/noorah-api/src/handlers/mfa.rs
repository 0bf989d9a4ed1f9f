//! MFA enrollment and verification handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::{MfaSetup, MfaStatus, MfaVerification};
use crate::state::AppState;

/// Longest code accepted (formatted backup codes with separators).
const MAX_CODE_LENGTH: usize = 32;

/// Body carrying a TOTP or backup code.
#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

impl CodeRequest {
    fn code(&self) -> ApiResult<&str> {
        let code = self.code.trim();
        if code.is_empty() {
            return Err(ApiError::bad_request("code is required"));
        }
        if code.len() > MAX_CODE_LENGTH {
            return Err(ApiError::bad_request("code is too long"));
        }
        Ok(code)
    }
}

/// Backup codes, shown to the user exactly once.
#[derive(Serialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
}

#[derive(Serialize)]
pub struct DisableResponse {
    pub enabled: bool,
}

/// Get the caller's MFA status.
pub async fn mfa_status(State(state): State<AppState>, user: AuthUser) -> Json<MfaStatus> {
    Json(state.mfa.status(&user.uid, Utc::now()).await)
}

/// Start enrollment: issue a pending secret and provisioning URI.
pub async fn mfa_setup(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<MfaSetup>> {
    let account = user.email.as_deref().unwrap_or(&user.uid);
    let setup = state.mfa.setup(&user.uid, account).await?;
    Ok(Json(setup))
}

/// Confirm enrollment with a first code.
pub async fn mfa_enable(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CodeRequest>,
) -> ApiResult<Json<BackupCodesResponse>> {
    let backup_codes = state.mfa.enable(&user.uid, request.code()?, Utc::now()).await?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}

/// Verify a TOTP or backup code.
pub async fn mfa_verify(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CodeRequest>,
) -> ApiResult<Json<MfaVerification>> {
    let verification = state.mfa.verify(&user.uid, request.code()?, Utc::now()).await?;
    Ok(Json(verification))
}

pub async fn mfa_disable(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CodeRequest>,
) -> ApiResult<Json<DisableResponse>> {
    state.mfa.disable(&user.uid, request.code()?, Utc::now()).await?;
    Ok(Json(DisableResponse { enabled: false }))
}

pub async fn regenerate_backup_codes(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CodeRequest>,
) -> ApiResult<Json<BackupCodesResponse>> {
    let backup_codes = state
        .mfa
        .regenerate_backup_codes(&user.uid, request.code()?, Utc::now())
        .await?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}
