// GraphQL documents used by the client.
//
// Each document is paired with its operation name so requests carry
// `operationName` and server logs stay readable.

/// A named GraphQL document.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub document: &'static str,
}

macro_rules! operation {
    ($ident:ident, $name:literal, $doc:expr) => {
        pub const $ident: Operation = Operation {
            name: $name,
            document: $doc,
        };
    };
}

// ── Navigation ──────────────────────────────────────────────────────

operation!(
    NAV_NODE_CHILDREN,
    "navNodeChildren",
    concat!(
        "query navNodeChildren($parentPath: ID!, $offset: Int, $limit: Int) {\n",
        "  navNodeChildren(parentPath: $parentPath, offset: $offset, limit: $limit) {\n",
        "    id uri name plainName nodeType icon description projectId\n",
        "    folder inline navigable filtered hasChildren features\n",
        "    object { type features }\n",
        "  }\n",
        "  navNodeInfo(nodePath: $parentPath) {\n",
        "    id uri name plainName nodeType icon description projectId\n",
        "    folder inline navigable filtered hasChildren features\n",
        "    object { type features }\n",
        "  }\n",
        "}\n"
    )
);

operation!(
    NAV_NODE_INFO,
    "navNodeInfo",
    concat!(
        "query navNodeInfo($nodePath: ID!, $withDetails: Boolean!) {\n",
        "  navNodeInfo(nodePath: $nodePath) {\n",
        "    id uri name plainName nodeType icon description projectId\n",
        "    folder inline navigable filtered hasChildren features\n",
        "    object { type features }\n",
        "    nodeDetails @include(if: $withDetails) {\n",
        "      id displayName description category dataType value features order\n",
        "    }\n",
        "  }\n",
        "}\n"
    )
);

operation!(
    NAV_OBJECT_INFO,
    "navObjectInfo",
    concat!(
        "query navObjectInfo($nodePath: ID!) {\n",
        "  navNodeInfo(nodePath: $nodePath) {\n",
        "    id uri name plainName nodeType icon description projectId\n",
        "    folder inline navigable filtered hasChildren features\n",
        "    object {\n",
        "      type features\n",
        "      properties {\n",
        "        id displayName description category dataType value features order\n",
        "      }\n",
        "    }\n",
        "  }\n",
        "}\n"
    )
);

operation!(
    NAV_RENAME_NODE,
    "navRenameNode",
    "mutation navRenameNode($nodePath: ID!, $newName: String!) {\n  navRenameNode(nodePath: $nodePath, newName: $newName)\n}\n"
);

operation!(
    NAV_DELETE_NODES,
    "navDeleteNodes",
    "mutation navDeleteNodes($nodePaths: [ID!]!) {\n  navDeleteNodes(nodePaths: $nodePaths)\n}\n"
);

operation!(
    NAV_MOVE_NODES_TO_FOLDER,
    "navMoveNodesToFolder",
    "mutation navMoveNodesToFolder($nodePaths: [ID!]!, $folderPath: ID!) {\n  navMoveNodesToFolder(nodePaths: $nodePaths, folderPath: $folderPath)\n}\n"
);

// ── Session / server ────────────────────────────────────────────────

operation!(
    SESSION_STATE,
    "sessionState",
    "query sessionState {\n  sessionState {\n    createTime lastAccessTime locale cacheExpired valid remainingTime actionParameters\n  }\n}\n"
);

operation!(
    SESSION_PERMISSIONS,
    "sessionPermissions",
    "query sessionPermissions {\n  permissions: sessionPermissions\n}\n"
);

operation!(
    TOUCH_SESSION,
    "touchSession",
    "mutation touchSession {\n  touchSession\n}\n"
);

operation!(
    SERVER_CONFIG,
    "serverConfig",
    concat!(
        "query serverConfig {\n",
        "  serverConfig {\n",
        "    name version workspaceId serverURL configurationMode developmentMode\n",
        "    anonymousAccessEnabled adminCredentialsSaveEnabled enabledFeatures\n",
        "    enabledAuthProviders supportedLanguages { isoCode displayName }\n",
        "  }\n",
        "}\n"
    )
);

operation!(
    CONFIGURE_SERVER,
    "configureServer",
    "mutation configureServer($configuration: ServerConfigInput!) {\n  configureServer(configuration: $configuration)\n}\n"
);

// ── Authentication ──────────────────────────────────────────────────

operation!(
    AUTH_LOGIN,
    "authLogin",
    concat!(
        "query authLogin($provider: ID!, $credentials: Object, $linkUser: Boolean) {\n",
        "  authInfo: authLogin(provider: $provider, credentials: $credentials, linkUser: $linkUser) {\n",
        "    authStatus\n",
        "    userTokens { authProvider displayName loginTime }\n",
        "  }\n",
        "}\n"
    )
);

operation!(
    AUTH_LOGOUT,
    "authLogout",
    "query authLogout {\n  authLogout\n}\n"
);

operation!(
    ACTIVE_USER,
    "activeUser",
    concat!(
        "query activeUser {\n",
        "  user: activeUser {\n",
        "    userId displayName authRole\n",
        "    authTokens { authProvider displayName loginTime }\n",
        "  }\n",
        "}\n"
    )
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_declare_their_operation_name() {
        for op in [
            NAV_NODE_CHILDREN,
            NAV_NODE_INFO,
            NAV_OBJECT_INFO,
            NAV_RENAME_NODE,
            NAV_DELETE_NODES,
            NAV_MOVE_NODES_TO_FOLDER,
            SESSION_STATE,
            SESSION_PERMISSIONS,
            TOUCH_SESSION,
            SERVER_CONFIG,
            CONFIGURE_SERVER,
            AUTH_LOGIN,
            AUTH_LOGOUT,
            ACTIVE_USER,
        ] {
            let header = op.document.lines().next().unwrap_or_default();
            assert!(
                header.contains(op.name),
                "{} missing from document header {header:?}",
                op.name
            );
        }
    }
}
