//! Administrative endpoints.

pub mod auth;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;

/// Admin routes. Authentication is applied by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(handlers::get_status))
        .route("/admin/modules/{slug}/deactivate", post(handlers::deactivate_module))
}
