// GraphQL HTTP client
//
// Wraps `reqwest::Client` with envelope handling: every request is a POST of
// `{ query, variables, operationName }`, every response is
// `{ data, errors }`. Endpoint groups (navigation, session, auth) are
// implemented as inherent methods in sibling files to keep this module
// focused on transport mechanics.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use super::operations::Operation;
use crate::error::Error;
use crate::latch::SessionExpiredLatch;
use crate::transport::TransportConfig;

/// Server error codes that mark the session as expired. Servers report
/// either spelling depending on which layer raised the error.
pub const SESSION_EXPIRED_CODES: &[&str] = &["sessionExpired", "session_expired"];

fn is_session_expired(code: Option<&str>) -> bool {
    code.is_some_and(|code| SESSION_EXPIRED_CODES.contains(&code))
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlErrorExtensions {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    stack_trace: Option<String>,
}

/// HTTP client for the server's GraphQL endpoint.
///
/// Every request first checks the [`SessionExpiredLatch`]. A response whose
/// error code says the session expired trips the latch, so subsequent calls
/// fail fast until the caller re-authenticates and clears it.
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: Url,
    latch: SessionExpiredLatch,
}

impl GraphQlClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        endpoint: Url,
        transport: &TransportConfig,
        latch: SessionExpiredLatch,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint,
            latch,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url, latch: SessionExpiredLatch) -> Self {
        Self {
            http,
            endpoint,
            latch,
        }
    }

    /// The GraphQL endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The latch this client consults before every request.
    pub fn latch(&self) -> &SessionExpiredLatch {
        &self.latch
    }

    /// Execute an operation and deserialize its `data` payload.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        variables: serde_json::Value,
    ) -> Result<T, Error> {
        if self.latch.is_tripped() {
            return Err(Error::SessionExpired);
        }

        debug!(operation = operation.name, "POST {}", self.endpoint);
        trace!(%variables, "operation variables");

        let body = serde_json::json!({
            "query": operation.document,
            "variables": variables,
            "operationName": operation.name,
        });

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Error::from_reqwest)?;

        self.parse_envelope(status, &text)
    }

    /// Unwrap the `{ data, errors }` envelope.
    ///
    /// GraphQL servers report most failures with HTTP 200 and a populated
    /// `errors` array, but some (gateway errors, auth filters) use a plain
    /// non-success status, so both shapes are handled.
    fn parse_envelope<T: DeserializeOwned>(
        &self,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Result<T, Error> {
        let parsed = serde_json::from_str::<GraphQlResponse>(body);

        let envelope = match parsed {
            Ok(envelope) => envelope,
            Err(e) => {
                if !status.is_success() {
                    return Err(Error::Http {
                        status: status.as_u16(),
                        body: body.chars().take(200).collect(),
                    });
                }
                let preview: String = body.chars().take(200).collect();
                return Err(Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body: body.to_owned(),
                });
            }
        };

        if let Some(first) = envelope.errors.into_iter().next() {
            let (code, stack_trace) = first
                .extensions
                .map(|ext| (ext.error_code, ext.stack_trace))
                .unwrap_or_default();

            if is_session_expired(code.as_deref()) {
                self.latch.trip();
                return Err(Error::SessionExpired);
            }

            return Err(Error::GraphQl {
                message: first.message,
                code,
                stack_trace,
            });
        }

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let data = envelope.data.ok_or_else(|| Error::Deserialization {
            message: "response has neither data nor errors".into(),
            body: body.to_owned(),
        })?;

        serde_json::from_value(data).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_owned(),
        })
    }
}
