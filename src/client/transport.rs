//! Transport between the client cache and the settings endpoint.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use crate::error::{SharingError, SharingResult};
use crate::sharing::{SaveSharingSettingsResponse, SharingSettingsMap, SharingSettingsPayload};

/// Path of the sharing settings endpoint, relative to the server root.
pub const SHARING_SETTINGS_PATH: &str = "/google-site-kit/v1/core/modules/data/sharing-settings";

/// Header naming the user on whose behalf settings are saved.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Fetches and saves the full sharing settings map.
#[async_trait]
pub trait SharingTransport: Send + Sync {
    /// Load the current settings and shareable roles.
    async fn fetch(&self) -> SharingResult<SharingSettingsPayload>;

    /// Persist the whole settings map.
    async fn save(&self, settings: &SharingSettingsMap) -> SharingResult<SaveSharingSettingsResponse>;
}

/// [`SharingTransport`] over HTTP.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    user_id: Option<u64>,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            user_id: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Save on behalf of this user.
    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, SHARING_SETTINGS_PATH)
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(user_id) = self.user_id {
            request = request.header(USER_ID_HEADER, user_id.to_string());
        }
        request
    }

    async fn check(response: Response) -> SharingResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(SharingError::Transport(format!(
            "settings endpoint returned status {}: {}",
            status, text
        )))
    }
}

#[async_trait]
impl SharingTransport for HttpTransport {
    async fn fetch(&self) -> SharingResult<SharingSettingsPayload> {
        let response = self.decorate(self.client.get(self.url())).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn save(&self, settings: &SharingSettingsMap) -> SharingResult<SaveSharingSettingsResponse> {
        let response = self
            .decorate(self.client.post(self.url()))
            .json(settings)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
