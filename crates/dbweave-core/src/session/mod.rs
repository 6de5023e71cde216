// ── Session resources ──
//
// Singleton mirrors of the server session. Invalidation runs
// permissions → session; login and logout clear the user resource and
// everything connected to it.

mod server_config;
mod state;

pub use server_config::ServerConfigResource;
pub use state::{
    PermissionsResource, SESSION_SETTINGS_KEY, SessionResource, SessionSettingsStore,
    UserResource,
};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use secrecy::SecretString;

    use super::*;
    use crate::backend::SessionBackend;
    use crate::model::SessionSettings;
    use crate::persist::MemoryStateStore;
    use crate::testing::FakeSession;
    use crate::wizard::ServerConfigurator;

    fn backend() -> (Arc<FakeSession>, Arc<dyn SessionBackend>) {
        let fake = Arc::new(FakeSession::default());
        let backend: Arc<dyn SessionBackend> = fake.clone();
        (fake, backend)
    }

    #[tokio::test]
    async fn permission_change_outdates_session() {
        let (fake, backend) = backend();
        let session = SessionResource::new(Arc::clone(&backend));
        let permissions = PermissionsResource::new(backend);
        permissions.resource().outdate_resource(&session);

        session.resource().load().await.unwrap();
        permissions.resource().load().await.unwrap();
        assert!(permissions.has("public"));

        permissions.resource().mark_outdated();
        assert!(session.resource().is_outdated());
        session.resource().load().await.unwrap();
        assert_eq!(fake.session_loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn touch_outdates_session() {
        let (fake, backend) = backend();
        let session = SessionResource::new(backend);
        session.resource().load().await.unwrap();

        session.touch().await.unwrap();

        assert_eq!(fake.touches.load(Ordering::SeqCst), 1);
        assert!(session.resource().is_outdated());
    }

    #[tokio::test]
    async fn require_reports_missing_permission() {
        let (_, backend) = backend();
        let permissions = PermissionsResource::new(backend);
        permissions.require("public").await.unwrap();
        assert!(permissions.require("admin").await.is_err());
    }

    #[tokio::test]
    async fn login_clears_connected_resources() {
        let (_, backend) = backend();
        let user = UserResource::new(Arc::clone(&backend));
        let permissions = PermissionsResource::new(Arc::clone(&backend));
        let session = SessionResource::new(backend);
        user.resource().connect(&permissions);
        user.resource().connect(&session);

        permissions.resource().load().await.unwrap();
        session.resource().load().await.unwrap();

        let err = user
            .login("local", "admin", &SecretString::from("wrong".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::CoreError::AuthenticationFailed { .. }));
        assert!(permissions.resource().is_loaded());

        let logged_in = user
            .login("local", "admin", &SecretString::from("secret".to_owned()))
            .await
            .unwrap();
        assert_eq!(logged_in.unwrap().id, "admin");
        assert!(user.is_authenticated());
        assert!(!permissions.resource().is_loaded());
        assert!(session.resource().data().is_none());

        permissions.resource().load().await.unwrap();
        assert!(permissions.has("admin"));

        user.logout().await.unwrap();
        assert!(permissions.resource().data().is_none());
        assert!(user.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn draft_saves_only_with_changes() {
        let (fake, backend) = backend();
        let config = ServerConfigResource::new(backend);
        config.resource().load().await.unwrap();

        config.save().await.unwrap();
        assert!(fake.configured.lock().unwrap().is_empty());

        config.update_draft(|d| d.server_name = Some("prod".into()));
        assert!(config.has_changes());
        config.save().await.unwrap();

        assert!(!config.has_changes());
        assert!(config.resource().is_outdated());
        let sent = fake.configured.lock().unwrap();
        assert_eq!(sent[0].server_name.as_deref(), Some("prod"));
    }

    #[tokio::test]
    async fn finishing_configuration_leaves_configuration_mode() {
        let (fake, backend) = backend();
        fake.configuration_mode.store(true, Ordering::SeqCst);
        let config = ServerConfigResource::new(backend);
        config.resource().load().await.unwrap();
        assert!(config.is_configuration_mode());

        config.finish_configuration().await.unwrap();

        assert_eq!(fake.configured.lock().unwrap().len(), 1);
        assert!(!config.is_configuration_mode());
    }

    #[test]
    fn settings_persist_locale() {
        let store = Arc::new(MemoryStateStore::new());
        let settings = SessionSettingsStore::new(store.clone());
        assert_eq!(settings.load().unwrap(), SessionSettings::default());

        settings.set_locale(Some("de".into())).unwrap();

        let reopened = SessionSettingsStore::new(store);
        assert_eq!(reopened.load().unwrap().locale.as_deref(), Some("de"));
    }
}
