//! Shared configuration for dbweave tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! translation to `dbweave_core::WorkbenchConfig`, and the file-backed
//! [`FileStateStore`] for client state that must survive restarts.

mod state;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dbweave_core::{Credentials, TlsVerification, WorkbenchConfig};

pub use state::FileStateStore;

const KEYRING_SERVICE: &str = "dbweave";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile name to use when none is given explicitly.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between event socket reconnect attempts.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,

    /// Seconds between keep-alive pings on an open socket.
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval: u64,

    /// Navigation children fetched per page.
    #[serde(default = "default_children_limit")]
    pub children_limit: usize,

    /// Where persisted client state lives. Defaults to the platform data dir.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            reconnect_interval: default_reconnect_interval(),
            keep_alive_interval: default_keep_alive_interval(),
            children_limit: default_children_limit(),
            state_dir: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_reconnect_interval() -> u64 {
    5
}
fn default_keep_alive_interval() -> u64 {
    30
}
fn default_children_limit() -> usize {
    dbweave_core::navigation::DEFAULT_CHILDREN_LIMIT
}

/// A named server profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "http://localhost:8978").
    pub server: String,

    /// GraphQL endpoint path, relative to `server`.
    #[serde(default)]
    pub graphql_path: Option<String>,

    /// Event socket path, relative to `server`.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Auth provider id.
    #[serde(default = "default_auth_provider")]
    pub auth_provider: String,

    /// Username for provider login. No username means anonymous access.
    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept self-signed certificates.
    pub insecure: Option<bool>,

    /// Override the default timeout.
    pub timeout: Option<u64>,

    /// Override the default children page size.
    pub children_limit: Option<usize>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            graphql_path: None,
            socket_path: None,
            auth_provider: default_auth_provider(),
            username: None,
            password: None,
            password_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            children_limit: None,
        }
    }
}

fn default_auth_provider() -> String {
    "local".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "dbweave", "dbweave")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("dbweave");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for persisted client state.
pub fn default_state_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("state"),
        |dirs| dirs.data_dir().join("state"),
    )
}

impl Defaults {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config layered as defaults, then `path`, then `DBWEAVE_*` env vars.
///
/// Nested keys use a double underscore: `DBWEAVE_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DBWEAVE_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Resolve the password for a profile: env var, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env, falling back to DBWEAVE_PASSWORD
    let env_name = profile.password_env.as_deref().unwrap_or("DBWEAVE_PASSWORD");
    if let Ok(val) = std::env::var(env_name) {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Login credentials for a profile, `None` for anonymous profiles.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<Credentials>, ConfigError> {
    let Some(username) = profile.username.clone() else {
        return Ok(None);
    };
    let password = resolve_password(profile, profile_name)?;
    Ok(Some(Credentials {
        provider: profile.auth_provider.clone(),
        username,
        password,
    }))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `WorkbenchConfig` from a profile and the global defaults.
pub fn profile_to_workbench_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<WorkbenchConfig, ConfigError> {
    let url: url::Url = profile.server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {}", profile.server),
    })?;

    let tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = WorkbenchConfig::new(url);
    if let Some(ref path) = profile.graphql_path {
        config.graphql_path.clone_from(path);
    }
    if let Some(ref path) = profile.socket_path {
        config.socket_path.clone_from(path);
    }
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.reconnect_interval = Duration::from_secs(defaults.reconnect_interval);
    config.keep_alive_interval = Duration::from_secs(defaults.keep_alive_interval);
    config.children_limit = profile.children_limit.unwrap_or(defaults.children_limit).max(1);
    config.credentials = resolve_credentials(profile, profile_name)?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "local"

[defaults]
timeout = 12
children_limit = 50

[profiles.local]
server = "http://localhost:8978"
username = "admin"
password = "hunter2"
password_env = "DBWEAVE_TEST_UNSET_PASSWORD_VAR"

[profiles.staging]
server = "https://db.example.com"
ca_cert = "/etc/ssl/dbweave.pem"
timeout = 60
"#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn loads_profiles_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&write_sample(&dir)).unwrap();

        assert_eq!(cfg.active_profile_name(None), "local");
        assert_eq!(cfg.active_profile_name(Some("staging")), "staging");
        assert_eq!(cfg.defaults.timeout, 12);
        assert_eq!(cfg.defaults.reconnect_interval, 5);
        assert_eq!(cfg.profiles.len(), 2);
        assert_eq!(cfg.profile("local").unwrap().auth_provider, "local");
        assert!(matches!(
            cfg.profile("missing"),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles
            .insert("dev".into(), Profile::new("http://127.0.0.1:8978"));
        save_config_to(&path, &cfg).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("dev").unwrap().server, "http://127.0.0.1:8978");
    }

    #[test]
    fn translates_profile_to_workbench_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&write_sample(&dir)).unwrap();

        let local = profile_to_workbench_config(
            cfg.profile("local").unwrap(),
            "local",
            &cfg.defaults,
        )
        .unwrap();
        assert_eq!(local.timeout, Duration::from_secs(12));
        assert_eq!(local.children_limit, 50);
        assert_eq!(local.tls, TlsVerification::SystemDefaults);
        let creds = local.credentials.unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.provider, "local");

        let staging = profile_to_workbench_config(
            cfg.profile("staging").unwrap(),
            "staging",
            &cfg.defaults,
        )
        .unwrap();
        assert_eq!(staging.timeout, Duration::from_secs(60));
        assert_eq!(
            staging.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/ssl/dbweave.pem"))
        );
        assert!(staging.credentials.is_none());
    }

    #[test]
    fn invalid_server_url_is_rejected() {
        let err = profile_to_workbench_config(
            &Profile::new("not a url"),
            "broken",
            &Defaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server"));
    }

    #[test]
    fn plaintext_password_is_last_resort() {
        let mut profile = Profile::new("http://localhost:8978");
        profile.username = Some("admin".into());
        profile.password = Some("plain".into());
        profile.password_env = Some("DBWEAVE_TEST_UNSET_PASSWORD_VAR".into());

        let creds = resolve_credentials(&profile, "dbweave-test-no-keyring-entry")
            .unwrap()
            .unwrap();
        assert_eq!(creds.password.expose_secret(), "plain");
    }
}
