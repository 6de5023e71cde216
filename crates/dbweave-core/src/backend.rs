// ── Backend seams ──
//
// Resources talk to the server only through these traits. `GraphQlClient`
// implements both; tests substitute in-memory fakes.

use async_trait::async_trait;
use secrecy::SecretString;

use dbweave_api::GraphQlClient;
use dbweave_api::graphql::models::ServerConfigInput;

use crate::error::CoreError;
use crate::model::{
    DbObject, NavChildrenPage, NavNode, Permissions, ServerConfig, ServerConfigUpdate,
    SessionState, User,
};

/// Navigator operations.
#[async_trait]
pub trait NavigationBackend: Send + Sync + 'static {
    /// One page of `parent`'s children together with `parent` itself.
    async fn node_children(
        &self,
        parent: &str,
        offset: usize,
        limit: usize,
    ) -> Result<NavChildrenPage, CoreError>;

    async fn node_info(&self, id: &str, with_details: bool) -> Result<NavNode, CoreError>;

    async fn object_info(&self, id: &str) -> Result<DbObject, CoreError>;

    /// Rename a node, returning the name the server settled on.
    async fn rename_node(&self, id: &str, name: &str) -> Result<String, CoreError>;

    async fn delete_nodes(&self, ids: &[String]) -> Result<u32, CoreError>;

    async fn move_nodes(&self, ids: &[String], folder: &str) -> Result<(), CoreError>;
}

/// Session, authentication and server configuration operations.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    async fn session_state(&self) -> Result<SessionState, CoreError>;

    async fn permissions(&self) -> Result<Permissions, CoreError>;

    async fn touch_session(&self) -> Result<(), CoreError>;

    async fn server_config(&self) -> Result<ServerConfig, CoreError>;

    async fn configure_server(&self, update: &ServerConfigUpdate) -> Result<(), CoreError>;

    async fn login(
        &self,
        provider: &str,
        user: &str,
        password: &SecretString,
    ) -> Result<(), CoreError>;

    async fn logout(&self) -> Result<(), CoreError>;

    /// `None` for anonymous sessions.
    async fn active_user(&self) -> Result<Option<User>, CoreError>;
}

// ── GraphQL implementation ───────────────────────────────────────────

#[async_trait]
impl NavigationBackend for GraphQlClient {
    async fn node_children(
        &self,
        parent: &str,
        offset: usize,
        limit: usize,
    ) -> Result<NavChildrenPage, CoreError> {
        let page = self.nav_node_children(parent, offset, limit).await?;
        Ok(NavChildrenPage {
            parent: page.nav_node_info.into(),
            children: page
                .nav_node_children
                .into_iter()
                .map(NavNode::from)
                .collect(),
        })
    }

    async fn node_info(&self, id: &str, with_details: bool) -> Result<NavNode, CoreError> {
        Ok(self.nav_node_info(id, with_details).await?.into())
    }

    async fn object_info(&self, id: &str) -> Result<DbObject, CoreError> {
        Ok(self.nav_object_info(id).await?.into())
    }

    async fn rename_node(&self, id: &str, name: &str) -> Result<String, CoreError> {
        Ok(self.nav_rename_node(id, name).await?)
    }

    async fn delete_nodes(&self, ids: &[String]) -> Result<u32, CoreError> {
        Ok(self.nav_delete_nodes(ids).await?)
    }

    async fn move_nodes(&self, ids: &[String], folder: &str) -> Result<(), CoreError> {
        Ok(self.nav_move_nodes_to_folder(ids, folder).await?)
    }
}

#[async_trait]
impl SessionBackend for GraphQlClient {
    async fn session_state(&self) -> Result<SessionState, CoreError> {
        Ok(GraphQlClient::session_state(self).await?.into())
    }

    async fn permissions(&self) -> Result<Permissions, CoreError> {
        Ok(self.session_permissions().await?.into_iter().collect())
    }

    async fn touch_session(&self) -> Result<(), CoreError> {
        Ok(GraphQlClient::touch_session(self).await?)
    }

    async fn server_config(&self) -> Result<ServerConfig, CoreError> {
        Ok(GraphQlClient::server_config(self).await?.into())
    }

    async fn configure_server(&self, update: &ServerConfigUpdate) -> Result<(), CoreError> {
        Ok(GraphQlClient::configure_server(self, &ServerConfigInput::from(update)).await?)
    }

    async fn login(
        &self,
        provider: &str,
        user: &str,
        password: &SecretString,
    ) -> Result<(), CoreError> {
        let info = self.auth_login(provider, user, password).await?;
        if info.auth_status.eq_ignore_ascii_case("success") {
            Ok(())
        } else {
            Err(CoreError::AuthenticationFailed {
                message: format!("authentication status: {}", info.auth_status),
            })
        }
    }

    async fn logout(&self) -> Result<(), CoreError> {
        Ok(self.auth_logout().await?)
    }

    async fn active_user(&self) -> Result<Option<User>, CoreError> {
        Ok(GraphQlClient::active_user(self).await?.map(User::from))
    }
}
