// Session and server configuration endpoints

use serde::Deserialize;
use serde_json::json;

use super::client::GraphQlClient;
use super::models::{ServerConfigInfo, ServerConfigInput, SessionInfo};
use super::operations;
use crate::error::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionStateData {
    session_state: SessionInfo,
}

#[derive(Deserialize)]
struct PermissionsData {
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TouchData {
    #[allow(dead_code)]
    touch_session: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerConfigData {
    server_config: ServerConfigInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigureData {
    #[allow(dead_code)]
    configure_server: Option<bool>,
}

impl GraphQlClient {
    pub async fn session_state(&self) -> Result<SessionInfo, Error> {
        let data: SessionStateData = self
            .execute(&operations::SESSION_STATE, json!({}))
            .await?;
        Ok(data.session_state)
    }

    pub async fn session_permissions(&self) -> Result<Vec<String>, Error> {
        let data: PermissionsData = self
            .execute(&operations::SESSION_PERMISSIONS, json!({}))
            .await?;
        Ok(data.permissions)
    }

    /// Extend the server-side session lifetime.
    pub async fn touch_session(&self) -> Result<(), Error> {
        let _: TouchData = self
            .execute(&operations::TOUCH_SESSION, json!({}))
            .await?;
        Ok(())
    }

    pub async fn server_config(&self) -> Result<ServerConfigInfo, Error> {
        let data: ServerConfigData = self
            .execute(&operations::SERVER_CONFIG, json!({}))
            .await?;
        Ok(data.server_config)
    }

    /// Persist server configuration. In configuration mode this also
    /// completes first-run setup on the server.
    pub async fn configure_server(&self, configuration: &ServerConfigInput) -> Result<(), Error> {
        let _: ConfigureData = self
            .execute(
                &operations::CONFIGURE_SERVER,
                json!({ "configuration": configuration }),
            )
            .await?;
        Ok(())
    }
}
