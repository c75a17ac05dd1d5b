//! Client side of dashboard sharing.
//!
//! # Responsibilities
//! - Mirror the server's sharing settings in a local cache
//! - Track edits against the last saved copy
//! - Guard saves against concurrent or empty submissions
//!
//! # Data Flow
//! ```text
//! boot payload / GET ──▶ SharingSettingsCache ◀── set_* edits
//!                               │
//!                      save_sharing_settings
//!                               ▼
//!                     SharingTransport (POST)
//! ```

pub mod boot;
pub mod cache;
pub mod guard;
pub mod transport;

pub use boot::{boot_payload_from_env, parse_boot_payload, BootPayload, BOOT_PAYLOAD_ENV};
pub use cache::SharingSettingsCache;
pub use guard::{SubmitState, INVARIANT_DOING_SUBMIT_SHARING_CHANGES, INVARIANT_SHARING_SETTINGS_NOT_CHANGED};
pub use transport::{HttpTransport, SharingTransport, SHARING_SETTINGS_PATH, USER_ID_HEADER};
