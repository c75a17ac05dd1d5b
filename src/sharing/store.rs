//! Persisted dashboard sharing settings.
//!
//! # Data Flow
//! ```text
//! raw payload → sanitize → replace listed slugs → option storage
//! option storage → sanitize → read-side defaults → get()
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::SharingResult;
use crate::observability::metrics;
use crate::sharing::modules::ActiveModules;
use crate::sharing::options::OptionStore;
use crate::sharing::sanitize::sanitize;
use crate::sharing::types::{SharingPartial, SharingSettingsMap};

/// Option name the sharing settings are stored under.
pub const OPTION: &str = "googlesitekit_dashboard_sharing";

/// Result of [`SharingSettingsStore::merge_changes`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeOutcome {
    /// Whether any slug was merged.
    pub merged: bool,
    /// Merged slugs whose access changed, sorted.
    pub changed: Vec<String>,
    /// Settings after the merge, with read-side defaults.
    pub settings: SharingSettingsMap,
}

/// Sharing settings backed by an [`OptionStore`].
pub struct SharingSettingsStore {
    options: Arc<dyn OptionStore>,
    /// Serializes read-modify-write sequences.
    write_lock: Mutex<()>,
}

impl SharingSettingsStore {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self {
            options,
            write_lock: Mutex::new(()),
        }
    }

    /// Stored settings without read-side defaults.
    pub fn raw(&self) -> SharingResult<SharingSettingsMap> {
        Ok(self
            .options
            .get(OPTION)?
            .map(|value| sanitize(&value))
            .unwrap_or_default())
    }

    /// Stored settings with `sharedRoles` defaulted to `[]` and
    /// `management` to `owner`.
    pub fn get(&self) -> SharingResult<SharingSettingsMap> {
        Ok(self
            .raw()?
            .into_iter()
            .map(|(slug, settings)| (slug, settings.with_defaults()))
            .collect())
    }

    /// Sanitize `raw` and replace the entries of the slugs it lists.
    pub fn set(&self, raw: &Value) -> SharingResult<()> {
        let sanitized = sanitize(raw);
        let _guard = self.write_lock.lock();
        let mut current = self.raw()?;
        current.extend(sanitized);
        self.write(&current)
    }

    /// Remove a module's entry. No-op if it has none.
    pub fn unset_module(&self, slug: &str) -> SharingResult<()> {
        let _guard = self.write_lock.lock();
        let mut current = self.raw()?;
        if current.remove(slug).is_some() {
            self.write(&current)?;
            tracing::info!(module = %slug, "Removed module sharing settings");
        }
        Ok(())
    }

    /// Roles the module is shared with, empty if none are recorded.
    pub fn get_shared_roles(&self, slug: &str) -> SharingResult<Vec<String>> {
        Ok(self
            .raw()?
            .remove(slug)
            .and_then(|settings| settings.shared_roles)
            .unwrap_or_default())
    }

    /// Union of the shared roles of every module.
    pub fn get_all_shared_roles(&self) -> SharingResult<BTreeSet<String>> {
        Ok(self
            .raw()?
            .into_values()
            .filter_map(|settings| settings.shared_roles)
            .flatten()
            .collect())
    }

    /// Merge a partial update into the stored settings.
    ///
    /// Slugs of inactive modules and `None` patches are skipped. Returns
    /// whether anything was merged; nothing is written otherwise.
    pub fn merge<A>(&self, partial: &SharingPartial, active: &A) -> SharingResult<bool>
    where
        A: ActiveModules + ?Sized,
    {
        Ok(self.merge_changes(partial, active)?.merged)
    }

    /// [`Self::merge`], also reporting which merged modules now grant
    /// different access. The comparison runs under the write lock, so a
    /// concurrent merge is never reported as a change of this one.
    pub fn merge_changes<A>(&self, partial: &SharingPartial, active: &A) -> SharingResult<MergeOutcome>
    where
        A: ActiveModules + ?Sized,
    {
        let _guard = self.write_lock.lock();
        let before = self.get()?;
        let mut settings = before.clone();
        let mut merged = Vec::new();

        for (slug, patch) in &partial.modules {
            let Some(patch) = patch else {
                tracing::debug!(module = %slug, "Skipping null sharing settings");
                continue;
            };
            if !active.is_active(slug) {
                tracing::debug!(module = %slug, "Skipping sharing settings of inactive module");
                continue;
            }

            patch.apply_to(settings.entry(slug.clone()).or_default());
            merged.push(slug.clone());
        }

        if merged.is_empty() {
            metrics::record_merge("noop");
            return Ok(MergeOutcome {
                merged: false,
                changed: Vec::new(),
                settings: before,
            });
        }

        self.write(&settings)?;
        metrics::record_merge("merged");
        tracing::info!(modules = merged.len(), "Merged sharing settings");

        let changed = merged
            .into_iter()
            .filter(|slug| match (before.get(slug), settings.get(slug)) {
                (Some(old), Some(new)) => !old.grants_same_access(new),
                _ => true,
            })
            .collect();

        Ok(MergeOutcome {
            merged: true,
            changed,
            settings,
        })
    }

    fn write(&self, settings: &SharingSettingsMap) -> SharingResult<()> {
        self.options.set(OPTION, serde_json::to_value(settings)?)?;
        metrics::record_shared_modules(
            settings
                .values()
                .filter(|s| s.shared_roles.as_ref().is_some_and(|r| !r.is_empty()))
                .count(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharing::options::MemoryOptions;
    use crate::sharing::sanitize::sanitize_partial;
    use serde_json::json;

    fn store() -> (SharingSettingsStore, Arc<MemoryOptions>) {
        let options = Arc::new(MemoryOptions::new());
        (SharingSettingsStore::new(options.clone()), options)
    }

    fn to_json(map: &SharingSettingsMap) -> Value {
        serde_json::to_value(map).unwrap()
    }

    #[test]
    fn test_get_default() {
        let (store, _) = store();
        assert!(store.get().unwrap().is_empty());
        assert!(store.raw().unwrap().is_empty());
    }

    #[test]
    fn test_set_stores_sanitized_option() {
        let (store, options) = store();
        store
            .set(&json!({
                "analytics": {
                    "sharedRoles": ["", "editor", ["edit"]],
                    "management": "owner",
                },
                "pagespeed-insights": {
                    "sharedRoles": "",
                    "management": "all_admins",
                },
                "search-console": {
                    "sharedRoles": null,
                    "management": "all_admins",
                },
            }))
            .unwrap();

        // Read the option directly to check sanitization in isolation.
        assert_eq!(
            options.get(OPTION).unwrap().unwrap(),
            json!({
                "analytics": { "sharedRoles": ["editor"], "management": "owner" },
                "pagespeed-insights": { "sharedRoles": [], "management": "all_admins" },
                "search-console": { "management": "all_admins" },
            })
        );
    }

    #[test]
    fn test_get_applies_defaults() {
        let (store, _) = store();
        store
            .set(&json!({
                "analytics": { "sharedRoles": "", "management": "" },
                "pagespeed-insights": { "sharedRoles": null, "management": "all_admins" },
                "adsense": { "sharedRoles": ["editor"], "management": null },
                "search-console": { "sharedRoles": ["editor", "subscriber"], "management": "all_admins" },
            }))
            .unwrap();

        assert_eq!(
            to_json(&store.get().unwrap()),
            json!({
                "analytics": { "sharedRoles": [], "management": "owner" },
                "pagespeed-insights": { "sharedRoles": [], "management": "all_admins" },
                "adsense": { "sharedRoles": ["editor"], "management": "owner" },
                "search-console": { "sharedRoles": ["editor", "subscriber"], "management": "all_admins" },
            })
        );
    }

    #[test]
    fn test_set_replaces_listed_slugs_only() {
        let (store, _) = store();
        store.set(&json!({ "a": { "management": "owner", "sharedRoles": ["editor"] } })).unwrap();
        store.set(&json!({ "b": { "management": "all_admins" } })).unwrap();
        store.set(&json!({ "a": { "management": "all_admins" } })).unwrap();

        assert_eq!(
            to_json(&store.raw().unwrap()),
            json!({
                "a": { "management": "all_admins" },
                "b": { "management": "all_admins" },
            })
        );
    }

    #[test]
    fn test_unset_module() {
        let (store, _) = store();
        let settings = json!({
            "analytics": { "sharedRoles": [], "management": "owner" },
            "pagespeed-insights": { "sharedRoles": [], "management": "all_admins" },
            "adsense": { "sharedRoles": ["editor"], "management": "owner" },
        });
        store.set(&settings).unwrap();
        assert_eq!(to_json(&store.get().unwrap()), settings);

        store.unset_module("pagespeed-insights").unwrap();
        let expected = json!({
            "analytics": { "sharedRoles": [], "management": "owner" },
            "adsense": { "sharedRoles": ["editor"], "management": "owner" },
        });
        assert_eq!(to_json(&store.get().unwrap()), expected);

        store.unset_module("pagespeed-insights").unwrap();
        assert_eq!(to_json(&store.get().unwrap()), expected);
    }

    #[test]
    fn test_get_shared_roles() {
        let (store, _) = store();
        assert!(store.get_shared_roles("pagespeed-insights").unwrap().is_empty());

        store
            .set(&json!({
                "analytics": { "sharedRoles": ["editor", "subscriber"], "management": "owner" },
                "pagespeed-insights": { "sharedRoles": [], "management": "all_admins" },
                "search-console": { "management": "all_admins" },
            }))
            .unwrap();

        assert_eq!(store.get_shared_roles("analytics").unwrap(), vec!["editor", "subscriber"]);
        assert!(store.get_shared_roles("pagespeed-insights").unwrap().is_empty());
        assert!(store.get_shared_roles("search-console").unwrap().is_empty());
    }

    #[test]
    fn test_get_all_shared_roles() {
        let (store, _) = store();
        store
            .set(&json!({
                "analytics": { "sharedRoles": ["contributor"], "management": "" },
                "pagespeed-insights": { "sharedRoles": null, "management": "all_admins" },
                "adsense": { "sharedRoles": ["editor"], "management": null },
                "search-console": { "sharedRoles": ["editor", "subscriber"], "management": "all_admins" },
            }))
            .unwrap();

        let roles: Vec<String> = store.get_all_shared_roles().unwrap().into_iter().collect();
        assert_eq!(roles, vec!["contributor", "editor", "subscriber"]);
    }

    #[test]
    fn test_merge() {
        let (store, _) = store();
        let active: &[&str] = &["search-console", "analytics", "pagespeed-insights"];

        store
            .set(&json!({
                "search-console": { "sharedRoles": ["contributor"], "management": "owner" },
                "analytics": { "sharedRoles": ["contributor", "subscriber"], "management": "all_admins" },
                "pagespeed-insights": { "sharedRoles": [], "management": "all_admins" },
            }))
            .unwrap();
        let initial = store.raw().unwrap();

        // Inactive modules are not merged.
        let partial = sanitize_partial(&json!({
            "adsense": { "sharedRoles": ["editor"], "management": "owner" },
        }));
        assert!(!store.merge(&partial, active).unwrap());
        assert_eq!(store.raw().unwrap(), initial);

        // Null values are ignored.
        let partial = sanitize_partial(&json!({
            "search-console": null,
            "analytics": null,
        }));
        assert!(!store.merge(&partial, active).unwrap());
        assert_eq!(store.raw().unwrap(), initial);

        // Valid partials are merged, the rest is kept.
        let partial = sanitize_partial(&json!({
            "search-console": { "sharedRoles": ["contributor", "editor"] },
            "analytics": { "management": "owner" },
            "pagespeed-insights": { "sharedRoles": ["author"], "management": "owner" },
        }));
        assert!(store.merge(&partial, active).unwrap());
        assert_eq!(
            to_json(&store.get().unwrap()),
            json!({
                "search-console": { "sharedRoles": ["contributor", "editor"], "management": "owner" },
                "analytics": { "sharedRoles": ["contributor", "subscriber"], "management": "owner" },
                "pagespeed-insights": { "sharedRoles": ["author"], "management": "owner" },
            })
        );

        // Valid parts are kept, invalid parts discarded.
        let partial = sanitize_partial(&json!({
            "adsense": { "sharedRoles": ["editor"], "management": "owner" },
            "search-console": null,
            "analytics": { "sharedRoles": ["contributor"], "invalid": ["invalid"] },
            "pagespeed-insights": { "sharedRoles": ["subscriber"], "management": null },
        }));
        assert!(store.merge(&partial, active).unwrap());
        assert_eq!(
            to_json(&store.get().unwrap()),
            json!({
                "search-console": { "sharedRoles": ["contributor", "editor"], "management": "owner" },
                "analytics": { "sharedRoles": ["contributor"], "management": "owner" },
                "pagespeed-insights": { "sharedRoles": ["subscriber"], "management": "owner" },
            })
        );
    }

    #[test]
    fn test_merge_creates_entry_for_active_module() {
        let (store, _) = store();
        let active: &[&str] = &["tagmanager"];
        let partial = sanitize_partial(&json!({
            "tagmanager": { "management": "all_admins", "sharedRoles": "editor" },
        }));

        assert!(store.merge(&partial, active).unwrap());
        assert_eq!(
            to_json(&store.get().unwrap()),
            json!({ "tagmanager": { "sharedRoles": [], "management": "all_admins" } })
        );
    }

    #[test]
    fn test_merge_changes_ignores_role_order() {
        let (store, _) = store();
        let active: &[&str] = &["analytics", "search-console", "adsense"];
        store
            .set(&json!({
                "analytics": { "sharedRoles": ["editor", "author"], "management": "owner" },
                "search-console": { "sharedRoles": ["editor"] },
            }))
            .unwrap();

        let outcome = store
            .merge_changes(
                &sanitize_partial(&json!({
                    "analytics": { "sharedRoles": ["author", "editor"] },
                    "search-console": { "management": "all_admins" },
                    "adsense": { "management": "owner" },
                })),
                active,
            )
            .unwrap();

        assert!(outcome.merged);
        // The new adsense entry counts as a change; reordered roles do not.
        assert_eq!(outcome.changed, vec!["adsense".to_string(), "search-console".to_string()]);
        assert_eq!(
            outcome.settings["analytics"].shared_roles,
            Some(vec!["author".to_string(), "editor".to_string()])
        );
        assert_eq!(outcome.settings, store.get().unwrap());
    }
}
