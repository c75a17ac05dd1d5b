//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};

use crate::sharing::{OwnerId, RoleMetadata, ShareableRoles};

/// Root configuration for the sharing settings server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listener: ListenerConfig,
    pub timeouts: TimeoutConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub observability: ObservabilityConfig,

    /// Installed modules.
    pub modules: Vec<ModuleConfig>,

    /// Roles a module can be shared with.
    pub roles: Vec<RoleConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            storage: StorageConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
            modules: default_modules(),
            roles: vec![RoleConfig {
                id: "editor".to_string(),
                display_name: "Editor".to_string(),
            }],
        }
    }
}

impl ServerConfig {
    /// Shareable roles keyed by role id.
    pub fn shareable_roles(&self) -> ShareableRoles {
        self.roles
            .iter()
            .map(|role| {
                (
                    role.id.clone(),
                    RoleMetadata {
                        display_name: role.display_name.clone(),
                    },
                )
            })
            .collect()
    }
}

fn default_modules() -> Vec<ModuleConfig> {
    let module = |slug: &str, shareable: bool| ModuleConfig {
        slug: slug.to_string(),
        active: true,
        shareable,
        owner_id: None,
    };
    vec![
        module("analytics-4", true),
        module("search-console", true),
        module("pagespeed-insights", true),
        module("adsense", true),
        module("site-verification", false),
    ]
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body accepted.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Where sharing settings are persisted.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON options file. In-memory storage when unset.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token). Auth is off when unset.
    pub api_key: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// An installed module.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModuleConfig {
    pub slug: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "default_true")]
    pub shareable: bool,

    /// Initial owner, used only when no owner is recorded yet.
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoleConfig {
    pub id: String,
    pub display_name: String,
}
