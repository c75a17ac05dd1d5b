//! Module registry: which modules are active, which can be shared, and who
//! owns them.
//!
//! # Design Decisions
//! - Module flags are an immutable snapshot swapped atomically on reload
//! - Owner IDs live in a concurrent map and survive reloads

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::config::ModuleConfig;
use crate::sharing::types::OwnerId;

/// Source of truth for whether a module is currently active.
pub trait ActiveModules {
    fn is_active(&self, slug: &str) -> bool;
}

impl ActiveModules for HashSet<String> {
    fn is_active(&self, slug: &str) -> bool {
        self.contains(slug)
    }
}

impl ActiveModules for [&str] {
    fn is_active(&self, slug: &str) -> bool {
        self.iter().any(|s| *s == slug)
    }
}

/// Receiver of module ownership changes.
pub trait OwnerSink: Send + Sync {
    fn set_owner_id(&self, slug: &str, owner_id: OwnerId);
}

/// Concurrent slug -> owner map.
#[derive(Debug, Clone, Default)]
pub struct ModuleOwners {
    inner: Arc<DashMap<String, OwnerId>>,
}

impl ModuleOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slug: &str) -> Option<OwnerId> {
        self.inner.get(slug).map(|r| *r.value())
    }

    pub fn snapshot(&self) -> BTreeMap<String, OwnerId> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }
}

impl OwnerSink for ModuleOwners {
    fn set_owner_id(&self, slug: &str, owner_id: OwnerId) {
        self.inner.insert(slug.to_string(), owner_id);
        tracing::debug!(module = %slug, owner_id, "Module owner updated");
    }
}

/// Registry flags of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub active: bool,
    pub shareable: bool,
}

/// Modules known to the server.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: ArcSwap<HashMap<String, ModuleInfo>>,
    owners: ModuleOwners,
}

impl ModuleRegistry {
    /// Build the registry from configuration, seeding owners.
    pub fn from_config(configs: &[ModuleConfig]) -> Self {
        let registry = Self {
            modules: ArcSwap::from_pointee(HashMap::new()),
            owners: ModuleOwners::new(),
        };
        registry.reload(configs);
        registry
    }

    /// Replace module flags from configuration.
    ///
    /// Returns the slugs that were active before and are not anymore.
    /// Configured owners only fill in modules that have none yet.
    pub fn reload(&self, configs: &[ModuleConfig]) -> Vec<String> {
        let next: HashMap<String, ModuleInfo> = configs
            .iter()
            .map(|c| {
                (
                    c.slug.clone(),
                    ModuleInfo {
                        active: c.active,
                        shareable: c.shareable,
                    },
                )
            })
            .collect();

        for config in configs {
            if let Some(owner_id) = config.owner_id {
                if self.owners.get(&config.slug).is_none() {
                    self.owners.set_owner_id(&config.slug, owner_id);
                }
            }
        }

        let next = Arc::new(next);
        let previous = self.modules.swap(next.clone());

        let mut deactivated: Vec<String> = previous
            .iter()
            .filter(|(slug, info)| info.active && !next.get(*slug).is_some_and(|n| n.active))
            .map(|(slug, _)| slug.clone())
            .collect();
        deactivated.sort();

        tracing::info!(modules = next.len(), deactivated = deactivated.len(), "Module registry loaded");
        deactivated
    }

    /// Mark a module inactive. Returns false for unknown or already inactive modules.
    pub fn deactivate(&self, slug: &str) -> bool {
        // Applied to the latest snapshot so a concurrent reload is never lost.
        let previous = self.modules.rcu(|current| {
            let mut next = HashMap::clone(current);
            if let Some(info) = next.get_mut(slug) {
                info.active = false;
            }
            next
        });
        previous.get(slug).is_some_and(|info| info.active)
    }

    pub fn info(&self, slug: &str) -> Option<ModuleInfo> {
        self.modules.load().get(slug).copied()
    }

    pub fn is_shareable(&self, slug: &str) -> bool {
        self.info(slug).is_some_and(|info| info.shareable)
    }

    /// Slugs of active modules, sorted.
    pub fn active_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self
            .modules
            .load()
            .iter()
            .filter(|(_, info)| info.active)
            .map(|(slug, _)| slug.clone())
            .collect();
        slugs.sort();
        slugs
    }

    pub fn len(&self) -> usize {
        self.modules.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owners(&self) -> &ModuleOwners {
        &self.owners
    }
}

impl ActiveModules for ModuleRegistry {
    fn is_active(&self, slug: &str) -> bool {
        self.info(slug).is_some_and(|info| info.active)
    }
}
