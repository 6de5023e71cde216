// Authentication endpoints

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::client::GraphQlClient;
use super::models::{AuthInfo, UserInfo};
use super::operations;
use crate::error::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthLoginData {
    auth_info: AuthInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthLogoutData {
    #[allow(dead_code)]
    auth_logout: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ActiveUserData {
    user: Option<UserInfo>,
}

impl GraphQlClient {
    /// Authenticate the current session with a username/password provider.
    pub async fn auth_login(
        &self,
        provider: &str,
        user: &str,
        password: &SecretString,
    ) -> Result<AuthInfo, Error> {
        debug!(provider, user, "authenticating session");
        let data: AuthLoginData = self
            .execute(
                &operations::AUTH_LOGIN,
                json!({
                    "provider": provider,
                    "credentials": { "user": user, "password": password.expose_secret() },
                    "linkUser": false,
                }),
            )
            .await?;
        Ok(data.auth_info)
    }

    pub async fn auth_logout(&self) -> Result<(), Error> {
        let _: AuthLogoutData = self.execute(&operations::AUTH_LOGOUT, json!({})).await?;
        Ok(())
    }

    /// The user bound to the session, `None` when anonymous.
    pub async fn active_user(&self) -> Result<Option<UserInfo>, Error> {
        let data: ActiveUserData = self.execute(&operations::ACTIVE_USER, json!({})).await?;
        Ok(data.user)
    }
}
