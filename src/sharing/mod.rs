//! Dashboard sharing settings subsystem.
//!
//! # Data Flow
//! ```text
//! raw payload (JSON)
//!     → sanitize.rs (normalize roles / management)
//!     → store.rs (replace, unset, merge against active modules)
//!     → options.rs (durable option storage)
//!
//! Settings endpoint:
//!     service.rs → store.rs + modules.rs (active set, owners)
//! ```
//!
//! # Design Decisions
//! - Sanitizing never fails; malformed input is normalized
//! - The stored option keeps only sanitized fields; defaults are applied on read
//! - Merges skip inactive modules and `null` entries

pub mod modules;
pub mod options;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod types;

pub use modules::{ActiveModules, ModuleOwners, ModuleRegistry, OwnerSink};
pub use options::{JsonFileOptions, MemoryOptions, OptionStore};
pub use sanitize::{sanitize, sanitize_partial};
pub use service::{SaveSharingSettingsResponse, SharingService, SharingSettingsPayload};
pub use store::SharingSettingsStore;
pub use types::{
    Management, ModuleSharingPatch, ModuleSharingSettings, OwnerId, RoleMetadata, ShareableRoles,
    SharingPartial, SharingSettingsMap,
};
