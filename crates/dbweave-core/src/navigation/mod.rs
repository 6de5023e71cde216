// ── Navigation resources ──
//
// Three caches over the server's navigator: the tree structure, per-node
// info, and the database objects behind nodes. Deletions flow
// tree → node info → db objects.

mod node_info;
mod object;
mod tree;

pub use node_info::NavNodeInfoResource;
pub use object::DbObjectResource;
pub use tree::{DEFAULT_CHILDREN_LIMIT, NavTreeResource};
