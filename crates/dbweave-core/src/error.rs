// ── Core error types ──
//
// Domain-facing errors from dbweave-core. Consumers never see HTTP bodies
// or JSON parse failures directly: the `From<dbweave_api::Error>` impl
// folds transport-layer errors into the taxonomy a front-end acts on
// (offline banner, re-login prompt, error toast, "not found" placeholder).

use std::sync::Arc;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connectivity ─────────────────────────────────────────────────
    /// The server could not be reached at all.
    #[error("Network unavailable: {reason}")]
    Network { reason: String },

    /// The session expired; every request is blocked until re-authentication.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Server errors ────────────────────────────────────────────────
    #[error("Server error{}: {message}", code_suffix(.code))]
    Api {
        message: String,
        /// The server's error code (e.g. `"notFound"`).
        code: Option<String>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// A resource loader failed for `key`. Shared by every caller that
    /// awaited the same coalesced load.
    #[error("Failed to load {resource} {key}: {source}")]
    Load {
        resource: &'static str,
        key: String,
        #[source]
        source: Arc<CoreError>,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.into(),
        }
    }

    /// The innermost error, looking through [`CoreError::Load`] wrappers.
    pub fn root(&self) -> &CoreError {
        match self {
            Self::Load { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self.root(), Self::SessionExpired)
    }

    pub fn is_network(&self) -> bool {
        matches!(self.root(), Self::Network { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    /// Server error code, if the root cause carries one.
    pub fn code(&self) -> Option<&str> {
        match self.root() {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<dbweave_api::Error> for CoreError {
    fn from(err: dbweave_api::Error) -> Self {
        if err.is_network() {
            return CoreError::Network {
                reason: err.to_string(),
            };
        }

        match err {
            dbweave_api::Error::SessionExpired => CoreError::SessionExpired,
            dbweave_api::Error::GraphQl { message, code, .. } => CoreError::Api { message, code },
            dbweave_api::Error::Http { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                code: None,
            },
            dbweave_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            dbweave_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            dbweave_api::Error::WebSocketClosed => CoreError::Network {
                reason: "event socket closed".into(),
            },
            dbweave_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::Api {
                message: other.to_string(),
                code: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exposes_root_cause() {
        let err = CoreError::Load {
            resource: "nav-tree",
            key: "\"database://pg\"".into(),
            source: Arc::new(CoreError::SessionExpired),
        };
        assert!(err.is_session_expired());
        assert!(!err.is_network());
        assert!(err.to_string().starts_with("Failed to load nav-tree"));
    }

    #[test]
    fn graphql_error_keeps_code() {
        let err: CoreError = dbweave_api::Error::GraphQl {
            message: "no such node".into(),
            code: Some("notFound".into()),
            stack_trace: None,
        }
        .into();
        assert_eq!(err.code(), Some("notFound"));
        assert_eq!(err.to_string(), "Server error (notFound): no such node");
    }

    #[test]
    fn socket_failure_maps_to_network() {
        let err: CoreError = dbweave_api::Error::WebSocketConnect("refused".into()).into();
        assert!(err.is_network());
    }

    #[test]
    fn session_expired_maps_through() {
        let err: CoreError = dbweave_api::Error::SessionExpired.into();
        assert!(err.is_session_expired());
    }
}
