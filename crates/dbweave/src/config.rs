//! CLI configuration -- thin wrapper around `dbweave_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --username, --insecure, --timeout).

use std::sync::Arc;

use dbweave_config::{Config, FileStateStore, Profile};
use dbweave_core::{StateStore, WorkbenchConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use dbweave_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Everything a command needs to build a `Workbench`.
pub struct Resolved {
    pub profile_name: String,
    pub workbench: WorkbenchConfig,
    pub store: Arc<dyn StateStore>,
}

/// Build the workbench config from the config file, profile, and CLI overrides.
///
/// Flag values take priority over profile values. Without a matching
/// profile, `--server` alone is enough for anonymous access.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match (cfg.profiles.get(&profile_name), &global.server) {
        (Some(profile), _) => profile.clone(),
        (None, Some(server)) => Profile::new(server.clone()),
        (None, None) if global.profile.is_some() => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available.join(", "),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let workbench = dbweave_config::profile_to_workbench_config(&profile, &profile_name, &cfg.defaults)?;
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(cfg.defaults.state_dir()));

    Ok(Resolved {
        profile_name,
        workbench,
        store,
    })
}
