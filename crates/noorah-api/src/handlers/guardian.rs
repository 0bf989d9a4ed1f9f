//! Guardian Mode handlers: emergency contacts and check-in sessions.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use noorah_models::{CheckIn, EmergencyContact, GuardianSession, Location, SessionId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::{sanitize_note, validate_webhook_url};
use crate::services::SessionUpdate;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ContactsResponse {
    pub contacts: Vec<EmergencyContact>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactsRequest {
    pub contacts: Vec<EmergencyContact>,
}

/// Start-session body. Omitted durations fall back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub check_in_interval_secs: Option<u64>,
    #[serde(default)]
    pub grace_period_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckInRequest {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PanicRequest {
    #[serde(default)]
    pub location: Option<Location>,
}

/// List the caller's emergency contacts.
pub async fn get_contacts(State(state): State<AppState>, user: AuthUser) -> Json<ContactsResponse> {
    Json(ContactsResponse {
        contacts: state.guardian.contacts(&user.uid).await,
    })
}

/// Replace the caller's emergency contacts.
pub async fn update_contacts(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UpdateContactsRequest>,
) -> ApiResult<Json<ContactsResponse>> {
    let allow_http = !state.config.is_production();

    let mut contacts = request.contacts;
    for contact in &mut contacts {
        if let Some(url) = contact.webhook_url.take() {
            let url = validate_webhook_url(&url, allow_http)
                .map_err(|e| ApiError::bad_request(format!("{}: {}", contact.name, e)))?;
            contact.webhook_url = Some(url);
        }
    }

    let contacts = state.guardian.set_contacts(&user.uid, contacts).await?;
    info!(user_id = %user.uid, count = contacts.len(), "Emergency contacts updated");

    Ok(Json(ContactsResponse { contacts }))
}

/// Start a guardian session.
pub async fn start_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<Json<GuardianSession>> {
    let session = state
        .guardian
        .start(
            &user.uid,
            request.booking_id.filter(|b| !b.trim().is_empty()),
            request.check_in_interval_secs.map(Duration::from_secs),
            request.grace_period_secs.map(Duration::from_secs),
            Utc::now(),
        )
        .await?;
    Ok(Json(session))
}

/// The caller's live session.
pub async fn current_session(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<GuardianSession>> {
    state
        .guardian
        .current(&user.uid)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No active guardian session"))
}

pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<GuardianSession>> {
    let session = state.guardian.get(&user.uid, &SessionId::from(session_id)).await?;
    Ok(Json(session))
}

/// Check in. Sends an all-clear if contacts had already been alerted.
pub async fn check_in(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<String>,
    body: Result<Json<CheckInRequest>, JsonRejection>,
) -> ApiResult<Json<SessionUpdate>> {
    let request = optional_body(body)?;
    let check_in = CheckIn {
        at: Utc::now(),
        note: request.note.map(|n| sanitize_note(&n)).filter(|n| !n.is_empty()),
        location: request.location,
    };

    let update = state
        .guardian
        .check_in(&user.uid, &SessionId::from(session_id), check_in)
        .await?;
    Ok(Json(update))
}

/// Raise an SOS: escalate straight to emergency and notify every contact.
pub async fn panic_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<String>,
    body: Result<Json<PanicRequest>, JsonRejection>,
) -> ApiResult<Json<SessionUpdate>> {
    let request = optional_body(body)?;
    let update = state
        .guardian
        .panic(&user.uid, &SessionId::from(session_id), request.location, Utc::now())
        .await?;
    Ok(Json(update))
}

pub async fn end_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionUpdate>> {
    let update = state
        .guardian
        .end(&user.uid, &SessionId::from(session_id), Utc::now())
        .await?;
    Ok(Json(update))
}

/// A request sent without a JSON body gets the defaults. A JSON body that
/// fails to parse is a 400.
fn optional_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match body {
        Ok(Json(request)) => Ok(request),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}
