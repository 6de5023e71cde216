//! Config subcommand handlers. None of these contact a server.

use dbweave_config::{Config, Profile};

use super::util;
use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, save_config};
use crate::error::CliError;
use crate::output;

/// Human-readable config dump with passwords masked.
fn format_config_redacted(cfg: &Config) -> String {
    let mut lines = vec![format!(
        "default_profile = {}",
        cfg.default_profile.as_deref().unwrap_or("(none)")
    )];
    lines.push(format!(
        "defaults: output={} timeout={}s children_limit={} state_dir={}",
        cfg.defaults.output,
        cfg.defaults.timeout,
        cfg.defaults.children_limit,
        cfg.defaults.state_dir().display()
    ));

    let mut names: Vec<&String> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let Some(profile) = cfg.profiles.get(name) else {
            continue;
        };
        lines.push(String::new());
        lines.push(format!("[{name}]"));
        lines.push(output::detail_lines(&[
            ("server", profile.server.clone()),
            ("provider", profile.auth_provider.clone()),
            ("username", util::or_dash(profile.username.as_deref())),
            (
                "password",
                if profile.password.is_some() {
                    "********".into()
                } else {
                    "-".into()
                },
            ),
            ("password_env", util::or_dash(profile.password_env.as_deref())),
            ("insecure", profile.insecure.unwrap_or(false).to_string()),
        ]));
    }
    lines.join("\n")
}

/// A redacted copy for structured output.
fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: dbweave_config::Defaults {
            output: cfg.defaults.output.clone(),
            state_dir: cfg.defaults.state_dir.clone(),
            ..cfg.defaults
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, profile)| {
                let mut profile = profile.clone();
                if profile.password.is_some() {
                    profile.password = Some("********".into());
                }
                (name.clone(), profile)
            })
            .collect(),
    }
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Add {
            name,
            server,
            username,
            provider,
            default,
        } => {
            server.parse::<url::Url>().map_err(|e| CliError::Validation {
                field: "server".into(),
                reason: format!("invalid URL '{server}': {e}"),
            })?;

            let mut cfg = config::load_config_or_default();
            let mut profile = Profile::new(server);
            profile.username = username;
            profile.auth_provider = provider;
            cfg.profiles.insert(name.clone(), profile);
            if default || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Profile '{name}' saved to {}", config::config_path().display());
            }
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &redacted(&cfg),
                format_config_redacted,
                |_| "config".into(),
            );
            output::print_output(&out, global.quiet);
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: dbweave config add <name> --server <url>");
            } else {
                let mut names: Vec<&String> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(&cfg, profile_name));
            }
            let password = util::prompt_password("Password: ")?;
            dbweave_config::store_password(
                &profile_name,
                secrecy::ExposeSecret::expose_secret(&password),
            )?;
            if !global.quiet {
                eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            }
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
        }
    }
    Ok(())
}
