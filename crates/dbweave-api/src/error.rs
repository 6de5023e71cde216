use thiserror::Error;

/// Top-level error type for the `dbweave-api` crate.
///
/// Covers every failure mode of the server surfaces: HTTP transport,
/// GraphQL responses, the session-expired latch, and the event socket.
/// `dbweave-core` maps these into domain-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Connectivity lost: connection refused, DNS failure, timeout.
    #[error("Network unavailable: {0}")]
    Network(#[source] reqwest::Error),

    /// Any other HTTP transport error.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status outside the GraphQL envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Session ─────────────────────────────────────────────────────
    /// The server reported the session as expired. Every request fails
    /// with this error until the latch is cleared.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── GraphQL ─────────────────────────────────────────────────────
    /// Structured error from the GraphQL `errors` array.
    #[error("Server error{}: {message}", code_suffix(.code))]
    GraphQl {
        message: String,
        code: Option<String>,
        stack_trace: Option<String>,
    },

    // ── Event socket ────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket send failed or the socket task is gone.
    #[error("WebSocket channel closed")]
    WebSocketClosed,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the session must be re-established before any
    /// further request can succeed.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a connectivity problem rather than a
    /// server-side rejection.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) | Self::WebSocketConnect(_) => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Extract the server error code, if available.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::GraphQl { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Classify a raw `reqwest` error: connectivity problems become
    /// [`Error::Network`], everything else stays [`Error::Transport`].
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Network(err)
        } else {
            Self::Transport(err)
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}
