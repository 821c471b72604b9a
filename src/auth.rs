use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

/// Holds the API key used for upstream requests.
#[derive(Clone, Default)]
pub struct AuthStore {
    key: Arc<RwLock<Option<String>>>,
}

impl AuthStore {
    pub fn new(initial: Option<String>) -> Self {
        let store = Self::default();
        if let Some(key) = initial {
            store.set_api_key(key);
        }
        store
    }

    pub fn api_key(&self) -> Option<String> {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        let mut slot = self.key.write().unwrap_or_else(PoisonError::into_inner);
        *slot = (!key.is_empty()).then_some(key);
    }

    pub fn clear_api_key(&self) {
        let mut slot = self.key.write().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            info!("api key cleared");
        }
    }

    /// Clears the key only if it is still `expected`. Returns whether it did.
    pub fn clear_if(&self, expected: &str) -> bool {
        let mut slot = self.key.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_deref() != Some(expected) {
            return false;
        }
        *slot = None;
        info!("api key cleared");
        true
    }

    pub fn is_authenticated(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
