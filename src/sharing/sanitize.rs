//! Normalization of raw sharing settings payloads.
//!
//! # Rules
//! - `sharedRoles`: `null`/absent drops the field, arrays keep their
//!   non-empty string elements (first occurrence wins), anything else
//!   becomes `[]`
//! - `management`: `null`/absent drops the field, unknown values become `owner`
//! - non-object module values produce an empty entry, never an error
//!
//! Sanitizing is a pure function and is idempotent.

use serde_json::{Map, Value};

use crate::sharing::types::{
    Management, ModuleSharingPatch, ModuleSharingSettings, SharingPartial, SharingSettingsMap,
};

const SHARED_ROLES: &str = "sharedRoles";
const MANAGEMENT: &str = "management";

/// Sanitize a whole slug -> settings payload.
pub fn sanitize(raw: &Value) -> SharingSettingsMap {
    let Some(modules) = raw.as_object() else {
        return SharingSettingsMap::new();
    };

    modules
        .iter()
        .map(|(slug, settings)| (slug.clone(), sanitize_module(settings)))
        .collect()
}

/// Sanitize the settings of a single module.
pub fn sanitize_module(raw: &Value) -> ModuleSharingSettings {
    match raw.as_object() {
        Some(fields) => ModuleSharingSettings {
            shared_roles: field(fields, SHARED_ROLES).map(sanitize_shared_roles),
            management: field(fields, MANAGEMENT).map(sanitize_management),
        },
        None => ModuleSharingSettings::default(),
    }
}

/// Sanitize a non-null `sharedRoles` value.
pub fn sanitize_shared_roles(raw: &Value) -> Vec<String> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut roles: Vec<String> = Vec::with_capacity(items.len());
    for role in items.iter().filter_map(Value::as_str) {
        if !role.is_empty() && !roles.iter().any(|r| r == role) {
            roles.push(role.to_string());
        }
    }
    roles
}

/// Sanitize a non-null `management` value.
pub fn sanitize_management(raw: &Value) -> Management {
    raw.as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Management::Owner)
}

/// Build a typed partial update from a raw merge payload.
///
/// `null` values, non-objects and empty objects become explicit no-ops.
/// Unknown fields are dropped and fields set to `null` are left out of the
/// patch so the existing value survives the merge.
pub fn sanitize_partial(raw: &Value) -> SharingPartial {
    let Some(modules) = raw.as_object() else {
        return SharingPartial::new();
    };

    let modules = modules
        .iter()
        .map(|(slug, settings)| {
            let patch = settings
                .as_object()
                .filter(|fields| !fields.is_empty())
                .map(|fields| ModuleSharingPatch {
                    shared_roles: field(fields, SHARED_ROLES).map(sanitize_shared_roles),
                    management: field(fields, MANAGEMENT).map(sanitize_management),
                });
            (slug.clone(), patch)
        })
        .collect();

    SharingPartial { modules }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).filter(|value| !value.is_null())
}
