// ── Resource/cache layer ──
//
// Lazily loaded, observable caches of server state, plus the dependency
// wiring that keeps related caches consistent.

mod data;
mod dependency;
mod key;
mod map;
mod metadata;
mod stream;

pub use data::{CachedDataResource, DataLoader};
pub use dependency::{Dependent, ResourceHandle};
pub use key::{PageRange, ResourceAlias, ResourceId, ResourceKey};
pub use map::{CachedMapResource, Loaded, MapLoader, PageState, ResourceEvent};
pub use metadata::Metadata;
pub use stream::{ResourceStream, VersionStream};
