use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::Store;
use crate::services::packager::Packager;
use crate::storage::ObjectStorage;

/// Process-scoped resources, built once at startup and shared with every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            storage,
        }
    }

    pub fn packager(&self) -> Packager {
        Packager::new(self.storage.clone(), self.config.uploads.clone())
    }
}
