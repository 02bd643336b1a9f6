use std::sync::Arc;

use crate::auth::repo::CredentialStore;
use crate::config::AppConfig;
use crate::storage::{DocumentStore, FsDocumentStore, MemDocumentStore};
use crate::tasks::repo::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: CredentialStore,
    pub tasks: TaskStore,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let docs: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new(config.data_dir.clone()));
        Ok(Self::from_parts(config, docs))
    }

    pub fn from_parts(config: Arc<AppConfig>, docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: CredentialStore::new(docs.clone()),
            tasks: TaskStore::new(docs),
            config,
        }
    }

    /// State over the in-memory store, for tests.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            data_dir: "data".into(),
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                ttl_hours: 24,
            },
        });
        Self::from_parts(config, Arc::new(MemDocumentStore::default()))
    }
}
