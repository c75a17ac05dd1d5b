//! Bearer-key authentication.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::request::request_id;
use crate::http::server::AppState;

/// Require `Authorization: Bearer <admin.api_key>` when a key is configured.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = state.config();
    let Some(api_key) = config.admin.api_key.as_deref() else {
        return next.run(request).await;
    };

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_key);

    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(
        request_id = %request_id(request.headers()),
        path = %request.uri().path(),
        "Rejected unauthenticated request"
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "code": "unauthorized", "message": "Missing or invalid API key." })),
    )
        .into_response()
}
