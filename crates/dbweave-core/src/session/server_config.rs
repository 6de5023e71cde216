// ── Server configuration ──

use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::backend::SessionBackend;
use crate::error::CoreError;
use crate::model::{ServerConfig, ServerConfigUpdate};
use crate::resource::{CachedDataResource, DataLoader, Dependent, ResourceHandle};
use crate::wizard::ServerConfigurator;

struct ConfigLoader(Arc<dyn SessionBackend>);

#[async_trait]
impl DataLoader<ServerConfig> for ConfigLoader {
    async fn load(&self) -> Result<ServerConfig, CoreError> {
        self.0.server_config().await
    }
}

/// Server configuration plus a local draft of pending changes.
#[derive(Clone)]
pub struct ServerConfigResource {
    data: CachedDataResource<ServerConfig>,
    backend: Arc<dyn SessionBackend>,
    draft: Arc<Mutex<ServerConfigUpdate>>,
}

impl ServerConfigResource {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            data: CachedDataResource::new(
                "server-config",
                Arc::new(ConfigLoader(Arc::clone(&backend))),
            ),
            backend,
            draft: Arc::new(Mutex::new(ServerConfigUpdate::default())),
        }
    }

    /// The server has not completed first-run setup. `false` until loaded.
    pub fn is_configuration_mode(&self) -> bool {
        self.data.data().is_some_and(|c| c.configuration_mode)
    }

    pub fn draft(&self) -> ServerConfigUpdate {
        self.draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_draft(&self, f: impl FnOnce(&mut ServerConfigUpdate)) {
        f(&mut self.draft.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn has_changes(&self) -> bool {
        !self.draft().is_empty()
    }

    pub fn reset_draft(&self) {
        *self.draft.lock().unwrap_or_else(PoisonError::into_inner) = ServerConfigUpdate::default();
    }

    /// Send the draft to the server if it has changes.
    pub async fn save(&self) -> Result<(), CoreError> {
        if !self.has_changes() {
            debug!("server configuration unchanged, nothing to save");
            return Ok(());
        }
        self.submit().await
    }

    async fn submit(&self) -> Result<(), CoreError> {
        let update = self.draft();
        self.backend.configure_server(&update).await?;
        info!("server configuration saved");
        self.reset_draft();
        self.data.mark_outdated();
        Ok(())
    }

    pub fn resource(&self) -> &CachedDataResource<ServerConfig> {
        &self.data
    }
}

#[async_trait]
impl ServerConfigurator for ServerConfigResource {
    /// Submitting in configuration mode completes setup on the server, so
    /// the draft goes out even when empty.
    async fn finish_configuration(&self) -> Result<(), CoreError> {
        self.submit().await?;
        self.data.refresh().await?;
        Ok(())
    }
}

impl Dependent for ServerConfigResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.data.handle()
    }
}
