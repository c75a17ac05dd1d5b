//! Startup orchestration.
//!
//! Builds the sharing service from a validated configuration. Any error
//! here is fatal.

use std::path::Path;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::SharingResult;
use crate::sharing::{
    JsonFileOptions, MemoryOptions, ModuleRegistry, OptionStore, SharingService,
    SharingSettingsStore,
};

/// Open the configured option storage and assemble the service.
pub fn build_service(config: &ServerConfig) -> SharingResult<SharingService> {
    let options: Arc<dyn OptionStore> = match &config.storage.path {
        Some(path) => {
            tracing::info!(path = %path, "Using file-backed options");
            Arc::new(JsonFileOptions::open(Path::new(path))?)
        }
        None => {
            tracing::warn!("No storage path configured, sharing settings will not persist");
            Arc::new(MemoryOptions::new())
        }
    };

    let registry = Arc::new(ModuleRegistry::from_config(&config.modules));
    tracing::info!(
        modules = registry.len(),
        active = registry.active_slugs().len(),
        "Module registry initialized"
    );

    Ok(SharingService::new(
        SharingSettingsStore::new(options),
        registry,
        config.shareable_roles(),
    ))
}
