// ── Domain model ──
//
// Canonical client-side mirrors of server state. The API crate's wire
// types are converted into these in `convert.rs`.

pub mod navigation;
pub mod session;

pub use navigation::{DbObject, NavChildrenPage, NavNode, NodeKind, ObjectProperty, ROOT_NODE_ID};
pub use session::{
    AuthToken, Permissions, ServerConfig, ServerConfigUpdate, SessionSettings, SessionState, User,
};
