// ── Resource keys ──
//
// A resource is addressed by a single id, a list of ids, or an alias: a
// derived view over the collection such as "everything" or "page N of
// the children of X".

use std::fmt;
use std::hash::Hash;

/// Bounds every resource id satisfies.
pub trait ResourceId: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> ResourceId for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// An offset/limit window into an ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRange {
    pub offset: usize,
    pub limit: usize,
}

impl PageRange {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// Offset of the window that follows this one.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

/// A derived key that resolves to a set of concrete ids once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceAlias<K> {
    /// Every entity the server has.
    All,
    /// A page of the collection, optionally scoped to a parent entity.
    Page { target: Option<K>, range: PageRange },
}

impl<K> ResourceAlias<K> {
    /// The parent a page alias is scoped to.
    pub fn target(&self) -> Option<&K> {
        match self {
            Self::All => None,
            Self::Page { target, .. } => target.as_ref(),
        }
    }

    pub fn range(&self) -> Option<PageRange> {
        match self {
            Self::All => None,
            Self::Page { range, .. } => Some(*range),
        }
    }
}

/// Address of data within a [`CachedMapResource`](super::CachedMapResource).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey<K> {
    Key(K),
    List(Vec<K>),
    Alias(ResourceAlias<K>),
}

impl<K: ResourceId> ResourceKey<K> {
    pub fn all() -> Self {
        Self::Alias(ResourceAlias::All)
    }

    /// A page scoped to `target`.
    pub fn page(target: K, range: PageRange) -> Self {
        Self::Alias(ResourceAlias::Page {
            target: Some(target),
            range,
        })
    }

    /// Build the narrowest key for a set of ids.
    pub fn from_ids(mut ids: Vec<K>) -> Self {
        if ids.len() == 1 {
            if let Some(id) = ids.pop() {
                return Self::Key(id);
            }
        }
        Self::List(ids)
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Self::Alias(_))
    }

    /// Concrete ids named by this key. Aliases name none until resolved.
    pub fn ids(&self) -> Vec<K> {
        match self {
            Self::Key(k) => vec![k.clone()],
            Self::List(ks) => ks.clone(),
            Self::Alias(_) => Vec::new(),
        }
    }

    /// `true` if `id` is named by this key, directly or as a page target.
    pub fn includes(&self, id: &K) -> bool {
        match self {
            Self::Key(k) => k == id,
            Self::List(ks) => ks.contains(id),
            Self::Alias(ResourceAlias::All) => true,
            Self::Alias(ResourceAlias::Page { target, .. }) => target.as_ref() == Some(id),
        }
    }
}

impl<K> From<K> for ResourceKey<K> {
    fn from(key: K) -> Self {
        Self::Key(key)
    }
}

impl<K: fmt::Debug> fmt::Display for ResourceKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{k:?}"),
            Self::List(ks) => write!(f, "{ks:?}"),
            Self::Alias(ResourceAlias::All) => f.write_str("<all>"),
            Self::Alias(ResourceAlias::Page { target, range }) => match target {
                Some(t) => write!(f, "{t:?}[{}..{}]", range.offset, range.end()),
                None => write!(f, "[{}..{}]", range.offset, range.end()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ids_collapses_single_id() {
        assert_eq!(ResourceKey::from_ids(vec!["a"]), ResourceKey::Key("a"));
        assert_eq!(
            ResourceKey::from_ids(vec!["a", "b"]),
            ResourceKey::List(vec!["a", "b"])
        );
    }

    #[test]
    fn page_key_includes_its_target() {
        let key = ResourceKey::page("db", PageRange::new(100, 50));
        assert!(key.includes(&"db"));
        assert!(!key.includes(&"other"));
        assert_eq!(key.to_string(), "\"db\"[100..150]");
    }

    #[test]
    fn all_alias_names_no_ids() {
        let key: ResourceKey<u32> = ResourceKey::all();
        assert!(key.ids().is_empty());
        assert!(key.includes(&7));
        assert_eq!(key.to_string(), "<all>");
    }
}
