use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::AuthStore;
use crate::errors::FetchError;
use crate::models::{Play, Stats};

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: AuthStore,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth: AuthStore) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub async fn get_plays(&self, limit: u32, offset: u32) -> Result<Vec<Play>, FetchError> {
        self.fetch(&format!("/plays?limit={limit}&offset={offset}"))
            .await
    }

    pub async fn get_stats(&self) -> Result<Stats, FetchError> {
        self.fetch("/stats").await
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let Some(api_key) = self.auth.api_key() else {
            return Err(FetchError::NotAuthenticated);
        };

        let url = format!("{}{path}", self.base_url);
        debug!(%url, "upstream request");
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(%url, "upstream rejected api key");
            // A key entered while this request was in flight stays.
            self.auth.clear_if(&api_key);
            return Err(FetchError::SessionExpired);
        }
        if !status.is_success() {
            warn!(%url, %status, "upstream request failed");
            let reason = status.canonical_reason().unwrap_or(status.as_str());
            return Err(FetchError::Status(reason.to_string()));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| FetchError::Decode(err.to_string()))
    }
}
