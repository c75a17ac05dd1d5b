use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{SharingError, SharingResult};
use crate::http::server::AppState;
use crate::sharing::OwnerId;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub modules: usize,
    pub active_modules: Vec<String>,
    pub shared_modules: usize,
    pub shared_roles: BTreeSet<String>,
    pub owners: BTreeMap<String, OwnerId>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub slug: String,
    pub deactivated: bool,
}

pub async fn get_status(State(state): State<AppState>) -> SharingResult<Json<SystemStatus>> {
    let registry = state.service.registry();
    let store = state.service.store();

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        modules: registry.len(),
        active_modules: registry.active_slugs(),
        shared_modules: store.raw()?.len(),
        shared_roles: store.get_all_shared_roles()?,
        owners: registry.owners().snapshot(),
    }))
}

/// Deactivate a module and drop its sharing settings.
pub async fn deactivate_module(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> SharingResult<Json<DeactivateResponse>> {
    if state.service.registry().info(&slug).is_none() {
        return Err(SharingError::Validation(format!("unknown module '{}'.", slug)));
    }

    let deactivated = state.service.deactivate_module(&slug)?;
    tracing::info!(module = %slug, deactivated, "Module deactivated via admin API");
    Ok(Json(DeactivateResponse { slug, deactivated }))
}
