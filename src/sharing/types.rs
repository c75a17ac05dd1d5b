//! Sharing settings data model.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharingError;

/// Who may change the view-access delegation of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Management {
    /// Only the admin who connected the module.
    #[default]
    Owner,
    /// Any administrator.
    AllAdmins,
}

impl Management {
    pub const VALID: [&'static str; 2] = ["all_admins", "owner"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Management::Owner => "owner",
            Management::AllAdmins => "all_admins",
        }
    }
}

impl fmt::Display for Management {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Management {
    type Err = SharingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Management::Owner),
            "all_admins" => Ok(Management::AllAdmins),
            _ => Err(SharingError::Validation(format!(
                "management must be one of: {}.",
                Management::VALID.join(", ")
            ))),
        }
    }
}

/// Sharing settings of a single module.
///
/// Both fields are optional: the stored option keeps exactly what was
/// sanitized, and read-side defaults are applied by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleSharingSettings {
    #[serde(rename = "sharedRoles", default, skip_serializing_if = "Option::is_none")]
    pub shared_roles: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management: Option<Management>,
}

impl ModuleSharingSettings {
    pub fn new(shared_roles: Vec<String>, management: Management) -> Self {
        Self {
            shared_roles: Some(shared_roles),
            management: Some(management),
        }
    }

    /// Copy with `sharedRoles` defaulted to `[]` and `management` to `owner`.
    pub fn with_defaults(&self) -> Self {
        Self {
            shared_roles: Some(self.shared_roles.clone().unwrap_or_default()),
            management: Some(self.management.unwrap_or_default()),
        }
    }
    /// Whether both grant the same access: same management and the same
    /// set of roles. Role order and duplicates do not matter.
    pub fn grants_same_access(&self, other: &Self) -> bool {
        self.management.unwrap_or_default() == other.management.unwrap_or_default()
            && self.role_set() == other.role_set()
    }

    fn role_set(&self) -> BTreeSet<&str> {
        self.shared_roles.iter().flatten().map(String::as_str).collect()
    }
}

/// Module slug -> sharing settings.
pub type SharingSettingsMap = BTreeMap<String, ModuleSharingSettings>;

/// Display metadata of a role that modules can be shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMetadata {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Role id -> metadata.
pub type ShareableRoles = BTreeMap<String, RoleMetadata>;

/// Identifier of the user owning a module.
pub type OwnerId = u64;

/// Partial update of one module's sharing settings.
///
/// Fields left as `None` keep their current value when merged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleSharingPatch {
    pub shared_roles: Option<Vec<String>>,
    pub management: Option<Management>,
}

impl ModuleSharingPatch {
    /// Overlay the fields present in this patch on `current`.
    pub fn apply_to(&self, current: &mut ModuleSharingSettings) {
        if let Some(roles) = &self.shared_roles {
            current.shared_roles = Some(roles.clone());
        }
        if let Some(management) = self.management {
            current.management = Some(management);
        }
    }
}

/// Partial update of many modules. A `None` value is an explicit no-op.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SharingPartial {
    pub modules: BTreeMap<String, Option<ModuleSharingPatch>>,
}

impl SharingPartial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slug: impl Into<String>, patch: Option<ModuleSharingPatch>) -> Self {
        self.modules.insert(slug.into(), patch);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
