//! `dbweave session`: session state, auth, permissions, server config.

use tabled::Tabled;

use dbweave_core::{ServerConfig, SessionState, User, Workbench};

use super::util;
use crate::cli::{GlobalOpts, SessionArgs, SessionCommand};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PermissionRow {
    #[tabled(rename = "Permission")]
    name: String,
}

fn timestamp(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn session_detail(state: &SessionState, color: bool) -> String {
    output::detail_lines(&[
        ("Valid", output::flag(state.valid, color)),
        ("Created", timestamp(state.created_at)),
        ("Last access", timestamp(state.last_access_at)),
        ("Locale", util::or_dash(state.locale.as_deref())),
        (
            "Remaining",
            state
                .remaining_ms
                .map_or_else(|| "-".into(), |ms| format!("{}s", ms / 1000)),
        ),
        ("Cache expired", output::flag(state.cache_expired, color)),
    ])
}

fn user_detail(user: &Option<User>) -> String {
    let Some(user) = user else {
        return "anonymous".into();
    };
    let providers: Vec<&str> = user.tokens.iter().map(|t| t.provider.as_str()).collect();
    output::detail_lines(&[
        ("ID", user.id.clone()),
        ("Name", util::or_dash(user.display_name.as_deref())),
        ("Role", util::or_dash(user.role.as_deref())),
        ("Providers", providers.join(", ")),
    ])
}

fn server_detail(config: &ServerConfig, color: bool) -> String {
    output::detail_lines(&[
        ("Name", config.name.clone()),
        ("Version", config.version.clone()),
        ("URL", util::or_dash(config.server_url.as_deref())),
        ("Configuration mode", output::flag(config.configuration_mode, color)),
        ("Anonymous access", output::flag(config.anonymous_access_enabled, color)),
        ("Auth providers", config.enabled_auth_providers.join(", ")),
        ("Languages", config.supported_languages.join(", ")),
    ])
}

pub async fn handle(
    args: SessionArgs,
    workbench: &Workbench,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    match args.command {
        SessionCommand::Show => {
            let state = workbench.session().resource().load().await?;
            let rendered = output::render_single(
                &global.output,
                &*state,
                |s| session_detail(s, color),
                |s| s.valid.to_string(),
            );
            output::print_output(&rendered, global.quiet);
        }

        SessionCommand::Touch => {
            workbench.session().touch().await?;
            if !global.quiet {
                eprintln!("Session refreshed");
            }
        }

        SessionCommand::Permissions => {
            let permissions = workbench.permissions().resource().load().await?;
            let names: Vec<String> = permissions.iter().map(str::to_owned).collect();
            let rendered = output::render_list(
                &global.output,
                &names,
                |n| PermissionRow { name: n.clone() },
                Clone::clone,
            );
            output::print_output(&rendered, global.quiet);
        }

        SessionCommand::Whoami => {
            let user = workbench.user().current().await?;
            let rendered = output::render_single(&global.output, &user, user_detail, |u| {
                u.as_ref().map_or_else(String::new, |u| u.id.clone())
            });
            output::print_output(&rendered, global.quiet);
        }

        SessionCommand::Login { provider } => {
            let username = resolved
                .workbench
                .credentials
                .as_ref()
                .map(|c| c.username.clone())
                .or_else(|| global.username.clone())
                .ok_or_else(|| CliError::Validation {
                    field: "username".into(),
                    reason: "pass --username or configure one in the profile".into(),
                })?;
            let password = match resolved.workbench.credentials {
                Some(ref creds) => creds.password.clone(),
                None => util::prompt_password(&format!("Password for {username}: "))?,
            };
            let user = workbench
                .login(&provider, &username, &password)
                .await
                .map_err(|e| match CliError::from(e) {
                    CliError::AuthFailed { message, .. } => CliError::AuthFailed {
                        message,
                        profile: resolved.profile_name.clone(),
                    },
                    other => other,
                })?;
            let rendered = output::render_single(&global.output, &user, user_detail, |u| {
                u.as_ref().map_or_else(String::new, |u| u.id.clone())
            });
            output::print_output(&rendered, global.quiet);
        }

        SessionCommand::Logout => {
            workbench.logout().await?;
            if !global.quiet {
                eprintln!("Logged out");
            }
        }

        SessionCommand::ServerConfig => {
            let config = workbench.server_config().resource().load().await?;
            let rendered = output::render_single(
                &global.output,
                &*config,
                |c| server_detail(c, color),
                |c| c.name.clone(),
            );
            output::print_output(&rendered, global.quiet);
        }

        SessionCommand::Locale { locale, clear } => {
            let settings = if clear || locale.is_some() {
                workbench.settings().set_locale(locale)?
            } else {
                workbench.settings().load()?
            };
            let rendered = output::render_single(
                &global.output,
                &settings,
                |s| util::or_dash(s.locale.as_deref()),
                |s| s.locale.clone().unwrap_or_default(),
            );
            output::print_output(&rendered, global.quiet);
        }
    }
    Ok(())
}
