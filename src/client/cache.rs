//! Client-side cache of the dashboard sharing settings.
//!
//! Keeps a working copy the user edits and the saved copy last confirmed by
//! the endpoint. Dirty checking compares the two; saving submits the whole
//! working copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::boot::BootPayload;
use crate::client::guard::{self, HasSubmitState, SubmissionTicket, SubmitState};
use crate::client::transport::SharingTransport;
use crate::error::{SharingError, SharingResult};
use crate::sharing::{
    Management, ModuleSharingSettings, OwnerSink, SaveSharingSettingsResponse, ShareableRoles,
    SharingSettingsMap, SharingSettingsPayload,
};

#[derive(Debug, Default)]
struct CacheState {
    sharing_settings: Option<SharingSettingsMap>,
    saved_sharing_settings: Option<SharingSettingsMap>,
    shareable_roles: Option<ShareableRoles>,
    submit: SubmitState,
}

impl CacheState {
    fn have_changed(&self, keys: Option<&[&str]>) -> bool {
        match keys {
            Some(keys) => {
                pick(self.sharing_settings.as_ref(), keys)
                    != pick(self.saved_sharing_settings.as_ref(), keys)
            }
            None => self.sharing_settings != self.saved_sharing_settings,
        }
    }

    fn working_entry(&mut self, slug: &str) -> &mut ModuleSharingSettings {
        self.sharing_settings
            .get_or_insert_with(SharingSettingsMap::new)
            .entry(slug.to_string())
            .or_default()
    }
}

impl HasSubmitState for CacheState {
    fn submit_state_mut(&mut self) -> &mut SubmitState {
        &mut self.submit
    }
}

fn pick<'a>(
    settings: Option<&'a SharingSettingsMap>,
    keys: &[&str],
) -> BTreeMap<&'a str, &'a ModuleSharingSettings> {
    let Some(settings) = settings else {
        return BTreeMap::new();
    };
    keys.iter()
        .filter_map(|key| settings.get_key_value(*key))
        .map(|(slug, module)| (slug.as_str(), module))
        .collect()
}

fn require_slug(slug: &str) -> SharingResult<()> {
    if slug.is_empty() {
        return Err(SharingError::Validation("moduleSlug is required.".into()));
    }
    Ok(())
}

/// In-memory mirror of the sharing settings, synchronized with the endpoint.
pub struct SharingSettingsCache {
    state: RwLock<CacheState>,
    transport: Arc<dyn SharingTransport>,
    boot: Option<BootPayload>,
    owners: Option<Arc<dyn OwnerSink>>,
}

impl SharingSettingsCache {
    pub fn new(transport: Arc<dyn SharingTransport>) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            transport,
            boot: None,
            owners: None,
        }
    }

    /// Hydrate from this payload before falling back to the network.
    pub fn with_boot_payload(mut self, boot: Option<BootPayload>) -> Self {
        self.boot = boot;
        self
    }

    /// Forward ownership changes reported by saves to `owners`.
    pub fn with_owner_sink(mut self, owners: Arc<dyn OwnerSink>) -> Self {
        self.owners = Some(owners);
        self
    }

    /// Working copy, `None` until loaded.
    pub fn sharing_settings(&self) -> Option<SharingSettingsMap> {
        self.state.read().sharing_settings.clone()
    }

    /// Shareable roles, `None` until loaded.
    pub fn shareable_roles(&self) -> Option<ShareableRoles> {
        self.state.read().shareable_roles.clone()
    }

    /// Management of a module: outer `None` until loaded, inner `None` if
    /// the module has none recorded.
    pub fn sharing_management(&self, slug: &str) -> SharingResult<Option<Option<Management>>> {
        require_slug(slug)?;
        let state = self.state.read();
        Ok(state
            .sharing_settings
            .as_ref()
            .map(|settings| settings.get(slug).and_then(|s| s.management)))
    }

    /// Shared roles of a module: outer `None` until loaded, inner `None` if
    /// the module has none recorded.
    pub fn shared_roles(&self, slug: &str) -> SharingResult<Option<Option<Vec<String>>>> {
        require_slug(slug)?;
        let state = self.state.read();
        Ok(state
            .sharing_settings
            .as_ref()
            .map(|settings| settings.get(slug).and_then(|s| s.shared_roles.clone())))
    }

    /// Store settings confirmed by the server as both working and saved copy.
    pub fn receive_sharing_settings(&self, settings: SharingSettingsMap) {
        let mut state = self.state.write();
        state.saved_sharing_settings = Some(settings.clone());
        state.sharing_settings = Some(settings);
    }

    pub fn receive_shareable_roles(&self, roles: ShareableRoles) {
        self.state.write().shareable_roles = Some(roles);
    }

    /// Loaded settings, hydrating from the boot payload on first use.
    ///
    /// Without a boot payload an error is logged and `None` returned.
    pub fn resolve_sharing_settings(&self) -> Option<SharingSettingsMap> {
        if let Some(settings) = self.sharing_settings() {
            return Some(settings);
        }

        let Some(boot) = &self.boot else {
            tracing::error!("Could not load dashboard sharing settings");
            return None;
        };
        self.receive_sharing_settings(boot.settings.clone());
        Some(boot.settings.clone())
    }

    /// Loaded shareable roles, hydrating from the boot payload or, without
    /// one, fetching them from the endpoint.
    pub async fn resolve_shareable_roles(&self) -> SharingResult<Option<ShareableRoles>> {
        if let Some(roles) = self.shareable_roles() {
            return Ok(Some(roles));
        }

        if let Some(boot) = &self.boot {
            self.receive_shareable_roles(boot.roles.clone());
            return Ok(Some(boot.roles.clone()));
        }

        tracing::warn!("No boot payload for dashboard sharing roles, fetching");
        let payload = self.transport.fetch().await?;
        self.receive_shareable_roles(payload.roles.clone());
        Ok(Some(payload.roles))
    }

    /// Fetch settings and roles from the endpoint, replacing both copies.
    pub async fn fetch_sharing_settings(&self) -> SharingResult<SharingSettingsPayload> {
        let payload = self.transport.fetch().await?;
        self.receive_sharing_settings(payload.settings.clone());
        self.receive_shareable_roles(payload.roles.clone());
        tracing::debug!(modules = payload.settings.len(), "Fetched sharing settings");
        Ok(payload)
    }

    /// Set the management of a module in the working copy.
    pub fn set_sharing_management(&self, slug: &str, management: &str) -> SharingResult<()> {
        require_slug(slug)?;
        let management: Management = management.parse()?;
        self.state.write().working_entry(slug).management = Some(management);
        Ok(())
    }

    /// Set the shared roles of a module in the working copy.
    pub fn set_shared_roles(&self, slug: &str, roles: Vec<String>) -> SharingResult<()> {
        require_slug(slug)?;
        self.state.write().working_entry(slug).shared_roles = Some(roles);
        Ok(())
    }

    /// Whether the working copy differs from the saved copy, limited to
    /// `keys` when given.
    pub fn have_sharing_settings_changed(&self, keys: Option<&[&str]>) -> bool {
        self.state.read().have_changed(keys)
    }

    pub fn is_doing_submit_sharing_changes(&self) -> bool {
        self.state.read().submit == SubmitState::Submitting
    }

    /// Whether a guarded save would be accepted right now.
    pub fn can_submit_sharing_changes(&self) -> bool {
        let state = self.state.read();
        guard::can_submit(state.submit, state.have_changed(None))
    }

    /// Failing form of [`Self::can_submit_sharing_changes`].
    pub fn validate_can_submit_sharing_changes(&self) -> SharingResult<()> {
        let state = self.state.read();
        guard::validate_can_submit(state.submit, state.have_changed(None))
    }

    /// Save the working copy if nothing is in flight and it has changed.
    pub async fn save_sharing_settings(&self) -> SharingResult<SaveSharingSettingsResponse> {
        self.submit(true).await
    }

    /// Save the working copy even if it has not changed.
    ///
    /// Still refused while another save is in flight, since only one
    /// submission may hold the busy flag.
    pub async fn dangerous_save_sharing_settings(&self) -> SharingResult<SaveSharingSettingsResponse> {
        self.submit(false).await
    }

    async fn submit(&self, guarded: bool) -> SharingResult<SaveSharingSettingsResponse> {
        let (ticket, submitted) = {
            let mut state = self.state.write();
            if guarded {
                guard::validate_can_submit(state.submit, state.have_changed(None))?;
            } else if state.submit == SubmitState::Submitting {
                return Err(SharingError::Precondition(
                    guard::INVARIANT_DOING_SUBMIT_SHARING_CHANGES.into(),
                ));
            }
            let submitted = state
                .sharing_settings
                .clone()
                .ok_or_else(|| SharingError::Validation("sharingSettings is required.".into()))?;
            (SubmissionTicket::begin(&self.state, &mut *state), submitted)
        };

        let response = match self.transport.save(&submitted).await {
            Ok(response) => response,
            Err(e) => {
                drop(ticket);
                tracing::warn!(error = %e, "Saving sharing settings failed");
                return Err(e);
            }
        };

        {
            let mut state = self.state.write();
            state.saved_sharing_settings = Some(response.settings.clone());
            if state.sharing_settings.as_ref() == Some(&submitted) {
                state.sharing_settings = Some(response.settings.clone());
            } else {
                tracing::debug!("Keeping sharing settings edited during save");
            }
        }
        drop(ticket);
        tracing::info!(modules = response.settings.len(), "Saved sharing settings");

        if let Some(owners) = &self.owners {
            for (slug, owner_id) in &response.new_owner_ids {
                owners.set_owner_id(slug, *owner_id);
            }
        }

        Ok(response)
    }
}
