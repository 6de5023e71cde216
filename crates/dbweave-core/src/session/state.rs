// ── Session, permissions and user singletons ──

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::info;

use crate::backend::SessionBackend;
use crate::error::CoreError;
use crate::model::{Permissions, SessionSettings, SessionState, User};
use crate::persist::{self, StateStore};
use crate::resource::{CachedDataResource, DataLoader, Dependent, ResourceHandle};

/// State store key for [`SessionSettings`].
pub const SESSION_SETTINGS_KEY: &str = "session_settings";

struct SessionLoader(Arc<dyn SessionBackend>);

#[async_trait]
impl DataLoader<SessionState> for SessionLoader {
    async fn load(&self) -> Result<SessionState, CoreError> {
        self.0.session_state().await
    }
}

struct PermissionsLoader(Arc<dyn SessionBackend>);

#[async_trait]
impl DataLoader<Permissions> for PermissionsLoader {
    async fn load(&self) -> Result<Permissions, CoreError> {
        self.0.permissions().await
    }
}

struct UserLoader(Arc<dyn SessionBackend>);

#[async_trait]
impl DataLoader<Option<User>> for UserLoader {
    async fn load(&self) -> Result<Option<User>, CoreError> {
        self.0.active_user().await
    }
}

// ── SessionResource ──────────────────────────────────────────────────

/// The server-side session.
#[derive(Clone)]
pub struct SessionResource {
    data: CachedDataResource<SessionState>,
    backend: Arc<dyn SessionBackend>,
}

impl SessionResource {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            data: CachedDataResource::new("session", Arc::new(SessionLoader(Arc::clone(&backend)))),
            backend,
        }
    }

    /// Extend the session's lifetime on the server. The cached state goes
    /// stale since the remaining time changed.
    pub async fn touch(&self) -> Result<(), CoreError> {
        self.backend.touch_session().await?;
        self.data.mark_outdated();
        Ok(())
    }

    pub fn resource(&self) -> &CachedDataResource<SessionState> {
        &self.data
    }
}

impl Dependent for SessionResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.data.handle()
    }
}

// ── PermissionsResource ──────────────────────────────────────────────

/// Permissions granted to the session.
#[derive(Clone)]
pub struct PermissionsResource {
    data: CachedDataResource<Permissions>,
}

impl PermissionsResource {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            data: CachedDataResource::new("permissions", Arc::new(PermissionsLoader(backend))),
        }
    }

    /// Checks the cached set only; `false` until loaded.
    pub fn has(&self, permission: &str) -> bool {
        self.data.data().is_some_and(|p| p.has(permission))
    }

    pub async fn require(&self, permission: &str) -> Result<(), CoreError> {
        if self.data.load().await?.has(permission) {
            Ok(())
        } else {
            Err(CoreError::ValidationFailed {
                message: format!("missing permission: {permission}"),
            })
        }
    }

    pub fn resource(&self) -> &CachedDataResource<Permissions> {
        &self.data
    }
}

impl Dependent for PermissionsResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.data.handle()
    }
}

// ── UserResource ─────────────────────────────────────────────────────

/// The user bound to the session, `None` while anonymous.
///
/// Login and logout clear this resource, which clears everything wired to
/// it with `connect`.
#[derive(Clone)]
pub struct UserResource {
    data: CachedDataResource<Option<User>>,
    backend: Arc<dyn SessionBackend>,
}

impl UserResource {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            data: CachedDataResource::new("user", Arc::new(UserLoader(Arc::clone(&backend)))),
            backend,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.data().is_some_and(|u| u.is_some())
    }

    pub async fn login(
        &self,
        provider: &str,
        user: &str,
        password: &SecretString,
    ) -> Result<Option<User>, CoreError> {
        self.backend.login(provider, user, password).await?;
        info!(provider, user, "logged in");
        self.data.clear();
        self.current().await
    }

    pub async fn logout(&self) -> Result<(), CoreError> {
        self.backend.logout().await?;
        info!("logged out");
        self.data.clear();
        Ok(())
    }

    /// The active user, loading it if needed.
    pub async fn current(&self) -> Result<Option<User>, CoreError> {
        Ok(Option::clone(&*self.data.load().await?))
    }

    pub fn resource(&self) -> &CachedDataResource<Option<User>> {
        &self.data
    }
}

impl Dependent for UserResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.data.handle()
    }
}

// ── Session settings ─────────────────────────────────────────────────

/// Locally persisted session preferences.
#[derive(Clone)]
pub struct SessionSettingsStore {
    store: Arc<dyn StateStore>,
}

impl SessionSettingsStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<SessionSettings, CoreError> {
        persist::load_or_default(self.store.as_ref(), SESSION_SETTINGS_KEY)
    }

    pub fn save(&self, settings: &SessionSettings) -> Result<(), CoreError> {
        persist::save_as(self.store.as_ref(), SESSION_SETTINGS_KEY, settings)
    }

    pub fn set_locale(&self, locale: Option<String>) -> Result<SessionSettings, CoreError> {
        let mut settings = self.load()?;
        settings.locale = locale;
        self.save(&settings)?;
        Ok(settings)
    }
}
