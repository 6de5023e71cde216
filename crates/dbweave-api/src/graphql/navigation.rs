// Navigator endpoints
//
// Node paths double as node ids: `database://<connection>/<catalog>/...`.

use serde::Deserialize;
use serde_json::json;

use super::client::GraphQlClient;
use super::models::{NavNodeChildren, NavNodeInfo};
use super::operations;
use crate::error::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavNodeInfoData {
    nav_node_info: NavNodeInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameData {
    nav_rename_node: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteData {
    nav_delete_nodes: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveData {
    #[allow(dead_code)]
    nav_move_nodes_to_folder: Option<bool>,
}

impl GraphQlClient {
    /// One page of a node's children, plus the parent node itself.
    pub async fn nav_node_children(
        &self,
        parent_path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<NavNodeChildren, Error> {
        self.execute(
            &operations::NAV_NODE_CHILDREN,
            json!({ "parentPath": parent_path, "offset": offset, "limit": limit }),
        )
        .await
    }

    /// A single node, optionally with its detail properties.
    pub async fn nav_node_info(
        &self,
        node_path: &str,
        with_details: bool,
    ) -> Result<NavNodeInfo, Error> {
        let data: NavNodeInfoData = self
            .execute(
                &operations::NAV_NODE_INFO,
                json!({ "nodePath": node_path, "withDetails": with_details }),
            )
            .await?;
        Ok(data.nav_node_info)
    }

    /// A node with its database object properties.
    pub async fn nav_object_info(&self, node_path: &str) -> Result<NavNodeInfo, Error> {
        let data: NavNodeInfoData = self
            .execute(&operations::NAV_OBJECT_INFO, json!({ "nodePath": node_path }))
            .await?;
        Ok(data.nav_node_info)
    }

    /// Rename a node. Returns the name the server settled on.
    pub async fn nav_rename_node(&self, node_path: &str, new_name: &str) -> Result<String, Error> {
        let data: RenameData = self
            .execute(
                &operations::NAV_RENAME_NODE,
                json!({ "nodePath": node_path, "newName": new_name }),
            )
            .await?;
        Ok(data.nav_rename_node.unwrap_or_else(|| new_name.to_owned()))
    }

    /// Delete nodes. Returns how many the server removed.
    pub async fn nav_delete_nodes(&self, node_paths: &[String]) -> Result<u32, Error> {
        let data: DeleteData = self
            .execute(
                &operations::NAV_DELETE_NODES,
                json!({ "nodePaths": node_paths }),
            )
            .await?;
        Ok(data.nav_delete_nodes.unwrap_or_default())
    }

    /// Move nodes under another folder node.
    pub async fn nav_move_nodes_to_folder(
        &self,
        node_paths: &[String],
        folder_path: &str,
    ) -> Result<(), Error> {
        let _: MoveData = self
            .execute(
                &operations::NAV_MOVE_NODES_TO_FOLDER,
                json!({ "nodePaths": node_paths, "folderPath": folder_path }),
            )
            .await?;
        Ok(())
    }
}
