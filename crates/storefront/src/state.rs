//! Application state built once at startup.

use std::sync::Arc;

use amicale_core::remote::RemoteStore;

use crate::config::StorefrontConfig;
use crate::remote::RestClient;
use crate::services::auth::SessionGate;
use crate::services::cart::CartEngine;
use crate::services::preferences::LanguagePreference;
use crate::storage::{FileStorage, LocalStorage};

/// Application state shared by every command.
///
/// This struct is cheaply cloneable via `Arc` and owns the one remote store
/// client, the one session gate and the device storage.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn RemoteStore>,
    gate: SessionGate,
    storage: Arc<dyn LocalStorage>,
}

impl AppState {
    /// Connect to the configured backend with file-backed local storage.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, crate::error::AppError> {
        let store: Arc<dyn RemoteStore> = Arc::new(RestClient::new(&config)?);
        let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::new(config.data_dir.clone()));
        Ok(Self::with_parts(config, store, storage))
    }

    /// Build the state around an existing store and storage.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        store: Arc<dyn RemoteStore>,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        let gate = SessionGate::start(Arc::clone(&store));
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                gate,
                storage,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The remote store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.store
    }

    /// The session gate.
    #[must_use]
    pub fn gate(&self) -> &SessionGate {
        &self.inner.gate
    }

    /// The cart, restored from local storage.
    #[must_use]
    pub fn cart(&self) -> CartEngine {
        CartEngine::new(
            Arc::clone(&self.inner.store),
            self.inner.gate.clone(),
            Arc::clone(&self.inner.storage),
            self.inner.config.orphan_policy,
        )
    }

    /// The language preference.
    #[must_use]
    pub fn language(&self) -> LanguagePreference {
        LanguagePreference::new(Arc::clone(&self.inner.storage))
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.inner.gate.shutdown();
    }
}
