// ── Runtime workbench configuration ──
//
// Describes how to reach a server and how to tune the caches. Core never
// reads config files; `dbweave-config` builds a `WorkbenchConfig` and
// hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;
use crate::navigation::DEFAULT_CHILDREN_LIMIT;

/// Login credentials for a username/password auth provider.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Auth provider id, usually `local`.
    pub provider: String,
    pub username: String,
    pub password: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (development servers with self-signed certs).
    DangerAcceptInvalid,
}

/// Everything a [`Workbench`](crate::Workbench) needs to talk to a server.
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    /// Server base URL, e.g. `http://localhost:8978`.
    pub server_url: Url,
    /// GraphQL endpoint path relative to the server URL.
    pub graphql_path: String,
    /// Event socket path relative to the server URL.
    pub socket_path: String,
    pub tls: TlsVerification,
    pub timeout: Duration,
    pub reconnect_interval: Duration,
    pub keep_alive_interval: Duration,
    /// Children requested per navigation tree page.
    pub children_limit: usize,
    pub credentials: Option<Credentials>,
}

impl WorkbenchConfig {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            graphql_path: "/api/gql".into(),
            socket_path: "/api/ws".into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(30),
            children_limit: DEFAULT_CHILDREN_LIMIT,
            credentials: None,
        }
    }

    pub fn graphql_url(&self) -> Result<Url, CoreError> {
        join(&self.server_url, &self.graphql_path)
    }

    /// The socket URL: the server URL with a `ws`/`wss` scheme.
    pub fn socket_url(&self) -> Result<Url, CoreError> {
        let mut url = join(&self.server_url, &self.socket_path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| CoreError::Config {
            message: format!("cannot derive socket URL from {}", self.server_url),
        })?;
        Ok(url)
    }
}

fn join(base: &Url, path: &str) -> Result<Url, CoreError> {
    base.join(path).map_err(|e| CoreError::Config {
        message: format!("invalid endpoint path {path:?}: {e}"),
    })
}
