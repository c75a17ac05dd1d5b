//! Boot-time sharing data rendered by the server alongside the page.

use crate::error::{SharingError, SharingResult};
use crate::sharing::SharingSettingsPayload;

/// Environment variable holding the boot payload as JSON.
pub const BOOT_PAYLOAD_ENV: &str = "SITEKIT_DASHBOARD_SHARING_DATA";

/// Pre-hydration data for the client cache.
pub type BootPayload = SharingSettingsPayload;

/// Parse a boot payload.
pub fn parse_boot_payload(json: &str) -> SharingResult<BootPayload> {
    serde_json::from_str(json)
        .map_err(|e| SharingError::Validation(format!("invalid boot payload: {}", e)))
}

/// Read the boot payload from [`BOOT_PAYLOAD_ENV`], `None` when unset.
pub fn boot_payload_from_env() -> SharingResult<Option<BootPayload>> {
    match std::env::var(BOOT_PAYLOAD_ENV) {
        Ok(json) => parse_boot_payload(&json).map(Some),
        Err(_) => Ok(None),
    }
}
