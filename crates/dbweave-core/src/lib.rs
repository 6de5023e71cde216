//! Reactive data layer between `dbweave-api` and UI consumers.
//!
//! - **[`resource`]**: keyed and singleton caches with request coalescing,
//!   outdate/clear propagation and paged aliases.
//! - **[`navigation`]**: the database navigator tree, node metadata and
//!   object properties built on those caches.
//! - **[`session`]**: session state, permissions, the active user and the
//!   server configuration draft.
//! - **[`admin`]** and **[`wizard`]**: the administration item registry and
//!   the first-run configuration wizard.
//! - **[`Workbench`]**: the facade that owns and wires all of the above and
//!   feeds server events into it.

pub mod admin;
pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod model;
pub mod navigation;
pub mod persist;
pub mod resource;
pub mod session;
pub mod wizard;
pub mod workbench;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use admin::{
    ActiveItem, AdministrationItem, AdministrationRegistry, AdministrationScreen,
    AdministrationSubItem, ItemKind, WizardOptions,
};
pub use backend::{NavigationBackend, SessionBackend};
pub use config::{Credentials, TlsVerification, WorkbenchConfig};
pub use error::CoreError;
pub use events::{EventAction, EventBridge};
pub use navigation::{DbObjectResource, NavNodeInfoResource, NavTreeResource};
pub use persist::{MemoryStateStore, StateStore};
pub use resource::{CachedDataResource, CachedMapResource, ResourceEvent, ResourceKey};
pub use session::{
    PermissionsResource, ServerConfigResource, SessionResource, SessionSettingsStore, UserResource,
};
pub use wizard::{ConfigurationWizard, WizardTransition};
pub use workbench::Workbench;

pub use model::{
    AuthToken, DbObject, NavChildrenPage, NavNode, NodeKind, ObjectProperty, Permissions,
    ROOT_NODE_ID, ServerConfig, ServerConfigUpdate, SessionSettings, SessionState, User,
};
