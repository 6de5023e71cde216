//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use dbweave_config::ConfigError;
use dbweave_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the server: {reason}")]
    #[diagnostic(
        code(dbweave::connection_failed),
        help(
            "Check that the server is running and accessible.\n\
             Try: dbweave session show --server http://localhost:8978"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Session expired")]
    #[diagnostic(
        code(dbweave::session_expired),
        help("Log in again with: dbweave session login")
    )]
    SessionExpired,

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(dbweave::auth_failed),
        help(
            "Verify your username and password.\n\
             Store a password with: dbweave config set-password --profile {profile}"
        )
    )]
    AuthFailed { message: String, profile: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(dbweave::no_credentials),
        help(
            "Store one with: dbweave config set-password --profile {profile}\n\
             Or set the DBWEAVE_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("Missing permission '{permission}'")]
    #[diagnostic(
        code(dbweave::permission_denied),
        help("Log in as a user holding this permission.")
    )]
    PermissionDenied { permission: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(dbweave::not_found),
        help("Run: dbweave tree to see available nodes")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Server error ({code}): {message}")]
    #[diagnostic(code(dbweave::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(dbweave::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(dbweave::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: dbweave config add <name> --server <url>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(dbweave::no_config),
        help(
            "Pass --server, or create a profile with: dbweave config add default --server <url>\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(dbweave::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(dbweave::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::SessionExpired | Self::AuthFailed { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        // Coalesced loads share their cause; report the innermost one.
        let err = match err {
            CoreError::Load { source, .. } => clone_root(source.root()),
            other => other,
        };

        match err {
            CoreError::Network { reason } => CliError::ConnectionFailed { reason },
            CoreError::SessionExpired => CliError::SessionExpired,
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                message,
                profile: "default".into(),
            },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                resource_type: entity_type,
                identifier,
            },
            CoreError::Api { message, code } => match code.as_deref() {
                Some("accessDenied" | "access_denied") => CliError::PermissionDenied {
                    permission: message,
                },
                _ => CliError::ApiError {
                    code: code.unwrap_or_else(|| "unknown".into()),
                    message,
                },
            },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::OperationFailed { message } => CliError::ApiError {
                code: "operation_failed".into(),
                message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
            CoreError::Load { resource, key, .. } => CliError::ApiError {
                code: "load_failed".into(),
                message: format!("failed to load {resource} {key}"),
            },
        }
    }
}

/// Rebuild an owned copy of a shared root cause.
fn clone_root(err: &CoreError) -> CoreError {
    match err {
        CoreError::Network { reason } => CoreError::Network {
            reason: reason.clone(),
        },
        CoreError::SessionExpired => CoreError::SessionExpired,
        CoreError::AuthenticationFailed { message } => CoreError::AuthenticationFailed {
            message: message.clone(),
        },
        CoreError::Api { message, code } => CoreError::Api {
            message: message.clone(),
            code: code.clone(),
        },
        CoreError::NotFound {
            entity_type,
            identifier,
        } => CoreError::NotFound {
            entity_type: entity_type.clone(),
            identifier: identifier.clone(),
        },
        other => CoreError::Internal(other.to_string()),
    }
}
