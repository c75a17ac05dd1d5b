//! Sharing settings endpoint handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::Value;

use crate::client::USER_ID_HEADER;
use crate::error::{SharingError, SharingResult};
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::sharing::{OwnerId, SaveSharingSettingsResponse, SharingSettingsPayload};

pub async fn get_sharing_settings(
    State(state): State<AppState>,
) -> SharingResult<Json<SharingSettingsPayload>> {
    Ok(Json(state.service.payload()?))
}

/// Merge the posted settings map on behalf of the `X-User-Id` user.
pub async fn save_sharing_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> SharingResult<Json<SaveSharingSettingsResponse>> {
    let actor = actor_id(&headers)?;
    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| SharingError::Validation(format!("invalid JSON body: {}", e)))?;

    let response = state.service.save(actor, &raw)?;
    tracing::info!(
        request_id = %request_id(&headers),
        actor = ?actor,
        modules = response.settings.len(),
        new_owners = response.new_owner_ids.len(),
        "Sharing settings saved"
    );
    Ok(Json(response))
}

fn actor_id(headers: &HeaderMap) -> SharingResult<Option<OwnerId>> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| SharingError::Validation("X-User-Id must be a numeric user ID.".into()))
}
