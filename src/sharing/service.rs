//! Server-side sharing settings operations behind the settings endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SharingResult;
use crate::observability::metrics;
use crate::sharing::modules::{ModuleRegistry, OwnerSink};
use crate::sharing::sanitize::sanitize_partial;
use crate::sharing::store::SharingSettingsStore;
use crate::sharing::types::{OwnerId, ShareableRoles, SharingPartial, SharingSettingsMap};

/// Payload of the GET endpoint, also used as the boot-time payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SharingSettingsPayload {
    pub settings: SharingSettingsMap,
    #[serde(default)]
    pub roles: ShareableRoles,
}

/// Response of a successful save.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveSharingSettingsResponse {
    pub settings: SharingSettingsMap,
    #[serde(rename = "newOwnerIDs", default)]
    pub new_owner_ids: BTreeMap<String, OwnerId>,
}

/// Sharing settings store combined with the module registry.
pub struct SharingService {
    store: SharingSettingsStore,
    registry: Arc<ModuleRegistry>,
    roles: ArcSwap<ShareableRoles>,
}

impl SharingService {
    pub fn new(store: SharingSettingsStore, registry: Arc<ModuleRegistry>, roles: ShareableRoles) -> Self {
        Self {
            store,
            registry,
            roles: ArcSwap::from_pointee(roles),
        }
    }

    pub fn store(&self) -> &SharingSettingsStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Current settings and shareable roles.
    pub fn payload(&self) -> SharingResult<SharingSettingsPayload> {
        Ok(SharingSettingsPayload {
            settings: self.store.get()?,
            roles: ShareableRoles::clone(&self.roles.load()),
        })
    }

    /// Replace the shareable roles, e.g. after a config reload.
    pub fn set_roles(&self, roles: ShareableRoles) {
        self.roles.store(Arc::new(roles));
    }

    /// Merge a raw settings payload sent by `actor`.
    ///
    /// Modules that cannot be shared are ignored. Every module whose access
    /// changed is handed over to `actor` unless it already owns it.
    pub fn save(&self, actor: Option<OwnerId>, raw: &Value) -> SharingResult<SaveSharingSettingsResponse> {
        let result = self.merge_and_transfer(actor, raw);
        metrics::record_save(save_outcome(&result));
        result.map(|(_, response)| response)
    }

    fn merge_and_transfer(
        &self,
        actor: Option<OwnerId>,
        raw: &Value,
    ) -> SharingResult<(bool, SaveSharingSettingsResponse)> {
        let partial = self.shareable_only(sanitize_partial(raw));
        let outcome = self.store.merge_changes(&partial, &*self.registry)?;
        let mut new_owner_ids = BTreeMap::new();

        if let Some(actor) = actor {
            let owners = self.registry.owners();
            for slug in &outcome.changed {
                if owners.get(slug) != Some(actor) {
                    owners.set_owner_id(slug, actor);
                    new_owner_ids.insert(slug.clone(), actor);
                    tracing::info!(module = %slug, owner_id = actor, "Transferred module ownership");
                }
            }
        }

        Ok((
            outcome.merged,
            SaveSharingSettingsResponse {
                settings: outcome.settings,
                new_owner_ids,
            },
        ))
    }

    /// Deactivate a module and drop its sharing settings.
    pub fn deactivate_module(&self, slug: &str) -> SharingResult<bool> {
        let deactivated = self.registry.deactivate(slug);
        self.store.unset_module(slug)?;
        Ok(deactivated)
    }

    /// Drop the sharing settings of modules that are no longer active.
    pub fn unset_modules(&self, slugs: &[String]) -> SharingResult<()> {
        for slug in slugs {
            self.store.unset_module(slug)?;
        }
        Ok(())
    }

    fn shareable_only(&self, mut partial: SharingPartial) -> SharingPartial {
        partial.modules.retain(|slug, _| {
            let shareable = self.registry.is_shareable(slug);
            if !shareable {
                tracing::debug!(module = %slug, "Ignoring sharing settings of non-shareable module");
            }
            shareable
        });
        partial
    }
}

fn save_outcome<T>(result: &SharingResult<(bool, T)>) -> &'static str {
    match result {
        Ok((true, _)) => "merged",
        Ok((false, _)) => "noop",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::config::ModuleConfig;
    use crate::error::SharingError;
    use crate::sharing::options::{MemoryOptions, OptionStore};
    use crate::sharing::types::{Management, RoleMetadata};
    use parking_lot::Mutex;
    use serde_json::json;

    fn module(slug: &str, shareable: bool, owner_id: Option<OwnerId>) -> ModuleConfig {
        ModuleConfig {
            slug: slug.to_string(),
            active: true,
            shareable,
            owner_id,
        }
    }

    fn service() -> SharingService {
        service_with(Arc::new(MemoryOptions::new()))
    }

    fn service_with(options: Arc<dyn OptionStore>) -> SharingService {
        let registry = Arc::new(ModuleRegistry::from_config(&[
            module("analytics", true, Some(1)),
            module("search-console", true, Some(2)),
            module("site-verification", false, None),
        ]));
        let mut roles = ShareableRoles::new();
        roles.insert(
            "editor".into(),
            RoleMetadata {
                display_name: "Editor".into(),
            },
        );
        SharingService::new(SharingSettingsStore::new(options), registry, roles)
    }

    /// Blocks the first read after `arm` until released.
    struct GatedOptions {
        inner: MemoryOptions,
        armed: AtomicBool,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl GatedOptions {
        fn new() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let options = Self {
                inner: MemoryOptions::new(),
                armed: AtomicBool::new(false),
                entered: Mutex::new(Some(entered_tx)),
                release: Mutex::new(Some(release_rx)),
            };
            (options, entered_rx, release_tx)
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    impl OptionStore for GatedOptions {
        fn get(&self, name: &str) -> SharingResult<Option<Value>> {
            if self.armed.swap(false, Ordering::SeqCst) {
                if let Some(entered) = self.entered.lock().take() {
                    let _ = entered.send(());
                }
                let release = self.release.lock().take();
                if let Some(release) = release {
                    let _ = release.recv();
                }
            }
            self.inner.get(name)
        }

        fn set(&self, name: &str, value: Value) -> SharingResult<()> {
            self.inner.set(name, value)
        }

        fn delete(&self, name: &str) -> SharingResult<()> {
            self.inner.delete(name)
        }
    }

    struct FailingOptions;

    impl OptionStore for FailingOptions {
        fn get(&self, _name: &str) -> SharingResult<Option<Value>> {
            Err(SharingError::Storage("options table unavailable".into()))
        }

        fn set(&self, _name: &str, _value: Value) -> SharingResult<()> {
            Err(SharingError::Storage("options table unavailable".into()))
        }

        fn delete(&self, _name: &str) -> SharingResult<()> {
            Err(SharingError::Storage("options table unavailable".into()))
        }
    }

    #[test]
    fn test_payload() {
        let service = service();
        let payload = service.payload().unwrap();
        assert!(payload.settings.is_empty());
        assert_eq!(payload.roles["editor"].display_name, "Editor");
    }

    #[test]
    fn test_save_transfers_ownership_of_changed_modules() {
        let service = service();
        service
            .store()
            .set(&json!({
                "analytics": { "sharedRoles": [], "management": "all_admins" },
                "search-console": { "sharedRoles": ["editor"], "management": "all_admins" },
            }))
            .unwrap();

        let response = service
            .save(
                Some(2),
                &json!({
                    "analytics": { "sharedRoles": ["editor"] },
                    "search-console": { "sharedRoles": ["editor"], "management": "all_admins" },
                }),
            )
            .unwrap();

        assert_eq!(response.new_owner_ids, BTreeMap::from([("analytics".to_string(), 2)]));
        assert_eq!(service.registry().owners().get("analytics"), Some(2));
        assert_eq!(response.settings["analytics"].shared_roles, Some(vec!["editor".to_string()]));
        assert_eq!(response.settings["analytics"].management, Some(Management::AllAdmins));
    }

    #[test]
    fn test_save_by_owner_keeps_ownership() {
        let service = service();
        let response = service
            .save(Some(1), &json!({ "analytics": { "management": "all_admins" } }))
            .unwrap();
        assert!(response.new_owner_ids.is_empty());
        assert_eq!(response.settings["analytics"].management, Some(Management::AllAdmins));
    }

    #[test]
    fn test_save_ignores_non_shareable_modules() {
        let service = service();
        let response = service
            .save(Some(3), &json!({ "site-verification": { "management": "all_admins" } }))
            .unwrap();
        assert!(response.settings.is_empty());
        assert!(response.new_owner_ids.is_empty());
    }

    #[test]
    fn test_deactivate_module() {
        let service = service();
        service
            .store()
            .set(&json!({ "analytics": { "sharedRoles": ["editor"], "management": "owner" } }))
            .unwrap();

        assert!(service.deactivate_module("analytics").unwrap());
        assert!(service.store().get().unwrap().is_empty());

        // Inactive modules can no longer be merged.
        let response = service
            .save(Some(1), &json!({ "analytics": { "management": "all_admins" } }))
            .unwrap();
        assert!(response.settings.is_empty());
    }

    #[test]
    fn test_save_with_reordered_roles_keeps_ownership() {
        let service = service();
        service
            .store()
            .set(&json!({ "analytics": { "sharedRoles": ["editor", "author"], "management": "owner" } }))
            .unwrap();

        let response = service
            .save(Some(2), &json!({ "analytics": { "sharedRoles": ["author", "editor"] } }))
            .unwrap();

        assert!(response.new_owner_ids.is_empty());
        assert_eq!(service.registry().owners().get("analytics"), Some(1));
        assert_eq!(
            response.settings["analytics"].shared_roles,
            Some(vec!["author".to_string(), "editor".to_string()])
        );
    }

    #[test]
    fn test_concurrent_saves_transfer_only_the_changing_actor() {
        let (options, entered, release) = GatedOptions::new();
        let options = Arc::new(options);
        let service = service_with(options.clone());
        service
            .store()
            .set(&json!({ "analytics": { "sharedRoles": [], "management": "owner" } }))
            .unwrap();
        options.arm();

        let (first, second) = std::thread::scope(|scope| {
            let service = &service;
            let first = scope.spawn(move || service.save(Some(3), &json!({ "analytics": { "management": "owner" } })));
            entered.recv().unwrap();

            let second = scope.spawn(move || service.save(Some(2), &json!({ "analytics": { "sharedRoles": ["editor"] } })));
            std::thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();

            (first.join().unwrap().unwrap(), second.join().unwrap().unwrap())
        });

        assert!(first.new_owner_ids.is_empty());
        assert_eq!(second.new_owner_ids, BTreeMap::from([("analytics".to_string(), 2)]));
        assert_eq!(service.registry().owners().get("analytics"), Some(2));
        assert_eq!(
            service.store().get().unwrap()["analytics"].shared_roles,
            Some(vec!["editor".to_string()])
        );
    }

    #[test]
    fn test_save_reports_storage_failure() {
        let service = service_with(Arc::new(FailingOptions));
        let result = service.save(Some(1), &json!({ "analytics": { "management": "all_admins" } }));
        assert!(matches!(result, Err(SharingError::Storage(_))));
        assert_eq!(service.registry().owners().get("analytics"), Some(1));

        let failed: SharingResult<(bool, ())> = Err(SharingError::Storage("disk".into()));
        assert_eq!(save_outcome(&failed), "error");
        assert_eq!(save_outcome(&Ok((true, ()))), "merged");
        assert_eq!(save_outcome(&Ok((false, ()))), "noop");
    }
}
