// ── Workbench facade ──
//
// Owns every resource, wires their dependencies once at construction, and
// manages the event socket. Cheaply cloneable via `Arc<WorkbenchInner>`.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dbweave_api::events::{EventSocket, EventSocketConfig, ServerEvent, SocketGates, SocketState};
use dbweave_api::{GraphQlClient, SessionExpiredLatch, TlsMode, TransportConfig};

use crate::admin::AdministrationRegistry;
use crate::backend::{NavigationBackend, SessionBackend};
use crate::config::{TlsVerification, WorkbenchConfig};
use crate::error::CoreError;
use crate::events::EventBridge;
use crate::model::User;
use crate::navigation::{DbObjectResource, NavNodeInfoResource, NavTreeResource};
use crate::persist::StateStore;
use crate::session::{
    PermissionsResource, ServerConfigResource, SessionResource, SessionSettingsStore, UserResource,
};
use crate::wizard::ConfigurationWizard;

/// The main entry point for consumers.
#[derive(Clone)]
pub struct Workbench {
    inner: Arc<WorkbenchInner>,
}

struct WorkbenchInner {
    config: WorkbenchConfig,
    transport: TransportConfig,
    latch: SessionExpiredLatch,
    online: watch::Sender<bool>,
    store: Arc<dyn StateStore>,

    session: SessionResource,
    permissions: PermissionsResource,
    server_config: ServerConfigResource,
    user: UserResource,
    settings: SessionSettingsStore,
    node_info: NavNodeInfoResource,
    tree: NavTreeResource,
    db_objects: DbObjectResource,

    cancel: CancellationToken,
    socket: Mutex<Option<EventSocket>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Workbench {
    /// Build a workbench talking GraphQL to the configured server.
    pub fn new(config: WorkbenchConfig, store: Arc<dyn StateStore>) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let latch = SessionExpiredLatch::new();
        let client = Arc::new(GraphQlClient::new(
            config.graphql_url()?,
            &transport,
            latch.clone(),
        )?);
        Ok(Self::with_backends(
            config,
            store,
            client.clone(),
            client,
            transport,
            latch,
        ))
    }

    /// Build a workbench over arbitrary backends.
    pub fn with_backends(
        config: WorkbenchConfig,
        store: Arc<dyn StateStore>,
        navigation: Arc<dyn NavigationBackend>,
        session_backend: Arc<dyn SessionBackend>,
        transport: TransportConfig,
        latch: SessionExpiredLatch,
    ) -> Self {
        let session = SessionResource::new(Arc::clone(&session_backend));
        let permissions = PermissionsResource::new(Arc::clone(&session_backend));
        let server_config = ServerConfigResource::new(Arc::clone(&session_backend));
        let user = UserResource::new(session_backend);
        let node_info = NavNodeInfoResource::new(Arc::clone(&navigation));
        let db_objects = DbObjectResource::new(Arc::clone(&navigation), &node_info);
        let tree = NavTreeResource::new(navigation, node_info.clone(), config.children_limit);

        permissions.resource().outdate_resource(&session);
        session.resource().outdate_resource(&tree);
        tree.as_map().outdate_resource(&node_info);

        user.resource().connect(&session);
        user.resource().connect(&permissions);
        user.resource().connect(&tree);
        user.resource().connect(&node_info);

        Self {
            inner: Arc::new(WorkbenchInner {
                settings: SessionSettingsStore::new(Arc::clone(&store)),
                config,
                transport,
                latch,
                online: watch::channel(true).0,
                store,
                session,
                permissions,
                server_config,
                user,
                node_info,
                tree,
                db_objects,
                cancel: CancellationToken::new(),
                socket: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.inner.config
    }

    pub fn latch(&self) -> &SessionExpiredLatch {
        &self.inner.latch
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.inner.store
    }

    // ── Resources ────────────────────────────────────────────────────

    pub fn session(&self) -> &SessionResource {
        &self.inner.session
    }

    pub fn permissions(&self) -> &PermissionsResource {
        &self.inner.permissions
    }

    pub fn server_config(&self) -> &ServerConfigResource {
        &self.inner.server_config
    }

    pub fn user(&self) -> &UserResource {
        &self.inner.user
    }

    pub fn settings(&self) -> &SessionSettingsStore {
        &self.inner.settings
    }

    pub fn tree(&self) -> &NavTreeResource {
        &self.inner.tree
    }

    pub fn node_info(&self) -> &NavNodeInfoResource {
        &self.inner.node_info
    }

    pub fn db_objects(&self) -> &DbObjectResource {
        &self.inner.db_objects
    }

    /// A setup wizard over `registry`'s steps, persisting progress in this
    /// workbench's state store.
    pub fn wizard(&self, registry: &AdministrationRegistry) -> Result<ConfigurationWizard, CoreError> {
        ConfigurationWizard::new(
            registry,
            Arc::clone(&self.inner.store),
            Arc::new(self.inner.server_config.clone()),
        )
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate and reopen the session-expired latch.
    pub async fn login(
        &self,
        provider: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<User>, CoreError> {
        self.inner.latch.clear();
        self.inner.user.login(provider, username, password).await
    }

    /// Log in with the configured credentials, if any.
    pub async fn login_configured(&self) -> Result<Option<User>, CoreError> {
        let Some(creds) = self.inner.config.credentials.clone() else {
            return Err(CoreError::Config {
                message: "no credentials configured".into(),
            });
        };
        self.login(&creds.provider, &creds.username, &creds.password)
            .await
    }

    pub async fn logout(&self) -> Result<(), CoreError> {
        self.inner.user.logout().await
    }

    // ── Connectivity ─────────────────────────────────────────────────

    /// Report network reachability. Offline parks the event socket.
    pub fn set_online(&self, online: bool) {
        self.inner.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
    }

    pub fn watch_online(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    /// Open the event socket, subscribe to `topics`, and start applying
    /// pushed events to the caches. Replaces any previous socket.
    pub async fn connect_events(&self, topics: &[&str]) -> Result<watch::Receiver<SocketState>, CoreError> {
        let url = self.inner.config.socket_url()?;
        let cookie = self
            .inner
            .transport
            .cookie_header(&self.inner.config.graphql_url()?);

        let mut slot = self.inner.socket.lock().await;
        if let Some(previous) = slot.take() {
            previous.shutdown();
        }

        let socket = EventSocket::spawn(
            url,
            EventSocketConfig {
                reconnect_interval: self.inner.config.reconnect_interval,
                keep_alive_interval: self.inner.config.keep_alive_interval,
            },
            self.inner.cancel.child_token(),
            SocketGates {
                online: self.inner.online.subscribe(),
                latch: self.inner.latch.clone(),
            },
            cookie,
        );
        for topic in topics {
            socket.subscribe_topic(*topic)?;
        }

        let bridge = EventBridge {
            tree: self.inner.tree.clone(),
            session: self.inner.session.clone(),
            permissions: self.inner.permissions.clone(),
            server_config: self.inner.server_config.clone(),
            user: self.inner.user.clone(),
            latch: self.inner.latch.clone(),
        };
        let handle = bridge.spawn(socket.subscribe(), self.inner.cancel.child_token());
        self.inner.tasks.lock().await.push(handle);

        info!(topics = topics.len(), "event socket started");
        let state = socket.state();
        *slot = Some(socket);
        Ok(state)
    }

    /// Raw server events, `None` before [`connect_events`](Self::connect_events).
    pub async fn events(&self) -> Option<broadcast::Receiver<Arc<ServerEvent>>> {
        self.inner.socket.lock().await.as_ref().map(EventSocket::subscribe)
    }

    /// Stop the socket and background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(socket) = self.inner.socket.lock().await.take() {
            socket.shutdown();
        }
        let mut tasks = self.inner.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = handle.await;
        }
        debug!("workbench shut down");
    }
}

fn build_transport(config: &WorkbenchConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
        ..TransportConfig::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::persist::MemoryStateStore;
    use crate::testing::{FakeNavigation, FakeSession};

    fn workbench() -> (Arc<FakeSession>, Workbench) {
        let nav = Arc::new(FakeNavigation::with_tree(&[
            ("", &["pg"]),
            ("pg", &["pg/public"]),
        ]));
        let session = Arc::new(FakeSession::default());
        let config = WorkbenchConfig::new("http://localhost:8978".parse().unwrap());
        let bench = Workbench::with_backends(
            config,
            Arc::new(MemoryStateStore::new()),
            nav,
            session.clone(),
            TransportConfig::default(),
            SessionExpiredLatch::new(),
        );
        (session, bench)
    }

    #[tokio::test]
    async fn permission_change_reaches_node_info() {
        let (_, bench) = workbench();
        bench.session().resource().load().await.unwrap();
        bench.tree().load_children("").await.unwrap();
        bench.tree().load_children("pg").await.unwrap();

        bench.permissions().resource().mark_outdated();

        assert!(bench.session().resource().is_outdated());
        assert!(bench.tree().is_outdated("pg"));
        assert!(
            bench
                .node_info()
                .as_map()
                .is_outdated(&crate::resource::ResourceKey::Key("pg/public".into()))
        );
    }

    #[tokio::test]
    async fn login_reopens_latch_and_clears_tree() {
        let (session, bench) = workbench();
        bench.tree().load_children("").await.unwrap();
        bench.latch().trip();

        bench
            .login("local", "admin", &SecretString::from("secret".to_owned()))
            .await
            .unwrap();

        assert!(!bench.latch().is_tripped());
        assert!(bench.tree().get_children("").is_none());
        assert!(bench.node_info().get("pg").is_none());
        assert!(session.user.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn login_and_logout_drop_the_session_snapshot() {
        let (_, bench) = workbench();
        bench.session().resource().load().await.unwrap();

        bench
            .login("local", "admin", &SecretString::from("secret".to_owned()))
            .await
            .unwrap();
        assert!(bench.session().resource().data().is_none());

        bench.session().resource().load().await.unwrap();
        bench.logout().await.unwrap();
        assert!(bench.session().resource().data().is_none());
    }

    #[tokio::test]
    async fn login_without_configured_credentials_fails() {
        let (_, bench) = workbench();
        assert!(matches!(
            bench.login_configured().await,
            Err(CoreError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn online_flag_is_observable() {
        let (_, bench) = workbench();
        let mut rx = bench.watch_online();
        bench.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
        assert!(bench.events().await.is_none());
    }

    #[tokio::test]
    async fn wizard_finish_configures_server() {
        let (session, bench) = workbench();
        session.configuration_mode.store(true, Ordering::SeqCst);
        let mut builder = AdministrationRegistry::builder();
        builder
            .add(
                crate::admin::AdministrationItem::new("welcome")
                    .kind(crate::admin::ItemKind::ConfigurationWizard)
                    .wizard(crate::admin::WizardOptions::new(
                        1,
                        Arc::new(crate::admin::NoHooks),
                    )),
            )
            .unwrap();
        let wizard = bench.wizard(&builder.build()).unwrap();
        wizard.start();

        assert_eq!(
            wizard.next().await.unwrap(),
            crate::wizard::WizardTransition::Finished
        );
        assert_eq!(session.configured.lock().unwrap().len(), 1);
        assert!(!bench.server_config().is_configuration_mode());
    }
}
