//! Dashboard sharing settings for Site Kit modules.
//!
//! Server side: sanitizing, storing and merging per-module sharing
//! settings behind an HTTP endpoint. Client side: a cache of those settings
//! with dirty tracking and a guarded save.

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod sharing;

pub use client::SharingSettingsCache;
pub use config::ServerConfig;
pub use error::{SharingError, SharingResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use sharing::SharingService;
