use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::config::Config;
use crate::views::{PlayHistory, StatsPage};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mounted pages. A page is absent until first visited.
#[derive(Default)]
pub struct Views {
    pub plays: Option<PlayHistory>,
    pub stats: Option<StatsPage>,
}

impl Views {
    pub fn plays_mut(&mut self) -> Option<&mut PlayHistory> {
        self.plays.as_mut()
    }

    pub fn stats_mut(&mut self) -> Option<&mut StatsPage> {
        self.stats.as_mut()
    }

    /// Drops every page; their outstanding fetches settle unobserved.
    pub fn unmount_all(&mut self) {
        self.plays = None;
        self.stats = None;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub views: Arc<Mutex<Views>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let auth = AuthStore::new(config.api_key.clone());
        let api = ApiClient::new(config.api_url.clone(), auth);
        Self {
            config: Arc::new(config),
            api,
            views: Arc::new(Mutex::new(Views::default())),
        }
    }

    pub fn auth(&self) -> &AuthStore {
        self.api.auth()
    }
}
