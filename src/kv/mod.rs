//! Hierarchical namespaced key-value store.
//!
//! A store is a collection of *segments*, one per namespace. Namespaces form a
//! hierarchy through their string form alone: with the separator `::` the parent
//! of `app::module` is `app`, and `app` has no parent. Reads fall back to
//! ancestor segments; writes and removals only ever touch the local segment.
//!
//! ```no_run
//! # use slashkv::{db::Database, kv::{KeyValueStore, DEFAULT_SEPARATOR}};
//! # fn main() -> anyhow::Result<()> {
//! let store = KeyValueStore::new(Database::open_memory()?);
//! let app = store.get("app", Some(DEFAULT_SEPARATOR), true)?;
//! app.write("colour", "blue")?;
//!
//! let module = store.get("app::module", Some(DEFAULT_SEPARATOR), true)?;
//! assert_eq!(module.read("colour")?, Some("blue".to_string()));
//! # Ok(())
//! # }
//! ```

mod segment;

pub use segment::Segment;

use thiserror::Error;

use crate::db::Database;
use crate::models::SegmentRecord;

/// Separator used when callers ask for a hierarchy without naming one.
pub const DEFAULT_SEPARATOR: &str = "::";

#[derive(Debug, Error)]
pub enum KvError {
    #[error("namespace '{0}' does not exist")]
    NamespaceNotFound(String),
    #[error("namespace '{0}' already exists")]
    NamespaceAlreadyExists(String),
    #[error("key '{key}' not found in namespace '{namespace}'")]
    KeyNotFound { namespace: String, key: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = KvError> = std::result::Result<T, E>;

/// What [`KeyValueStore::update`] does when the namespace already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnExists {
    /// Fail with [`KvError::NamespaceAlreadyExists`] and change nothing.
    #[default]
    Raise,
    /// Erase the existing local entries, then apply the new ones.
    Clear,
    /// Merge; new values win on key collisions.
    Update,
}

/// Returns the parent of `namespace`, or `None` for a top-level namespace.
///
/// An empty separator disables the hierarchy.
pub fn parent_namespace<'a>(namespace: &'a str, separator: &str) -> Option<&'a str> {
    if separator.is_empty() {
        return None;
    }
    namespace.rsplit_once(separator).map(|(parent, _)| parent)
}

/// Handle to the store. Cheap to clone; every operation goes straight to the
/// database, nothing is cached.
#[derive(Clone)]
pub struct KeyValueStore {
    db: Database,
}

impl KeyValueStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// True iff a segment exists for exactly this namespace. Never creates one.
    pub fn exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.db.get_segment(namespace)?.is_some())
    }

    /// Retrieves the segment for `namespace`, creating it when allowed.
    ///
    /// Without a separator the segment is isolated. With one, every ancestor is
    /// fetched (or created) under the same policy and linked as the segment's
    /// parent chain. The links live only in the returned value.
    pub fn get(
        &self,
        namespace: &str,
        separator: Option<&str>,
        create_if_missing: bool,
    ) -> Result<Segment> {
        let mut lineage = vec![namespace];
        if let Some(separator) = separator {
            let mut current = namespace;
            while let Some(parent) = parent_namespace(current, separator) {
                lineage.push(parent);
                current = parent;
            }
        }

        let records = lineage
            .iter()
            .map(|ns| self.fetch(ns, create_if_missing))
            .collect::<Result<Vec<_>>>()?;

        let mut segment: Option<Segment> = None;
        for record in records.into_iter().rev() {
            segment = Some(Segment::new(self.db.clone(), record, segment));
        }
        segment.ok_or_else(|| KvError::NamespaceNotFound(namespace.to_string()))
    }

    /// Creates `namespace` if needed and writes `entries` into it according to
    /// `on_exists`. The returned segment has no parent.
    pub fn update<I, K, V>(&self, namespace: &str, entries: I, on_exists: OnExists) -> Result<Segment>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let existed = self.exists(namespace)?;
        if existed && on_exists == OnExists::Raise {
            return Err(KvError::NamespaceAlreadyExists(namespace.to_string()));
        }

        let segment = self.get(namespace, None, true)?;
        if existed && on_exists == OnExists::Clear {
            segment.clear()?;
        }
        for (key, value) in entries {
            segment.write(key.as_ref(), value.as_ref())?;
        }

        tracing::debug!(namespace, ?on_exists, existed, "Updated namespace");
        Ok(segment)
    }

    /// Deletes the segment and its entries. Ancestors and descendants are left
    /// alone. Returns false when there was nothing to delete.
    pub fn delete(&self, namespace: &str) -> Result<bool> {
        let deleted = self.db.delete_segment(namespace)?;
        if deleted {
            tracing::debug!(namespace, "Deleted namespace");
        }
        Ok(deleted)
    }

    /// All existing namespaces, sorted.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self
            .db
            .get_all_segments()?
            .into_iter()
            .map(|s| s.namespace)
            .collect())
    }

    fn fetch(&self, namespace: &str, create_if_missing: bool) -> Result<SegmentRecord> {
        match self.db.get_segment(namespace)? {
            Some(record) => Ok(record),
            None if create_if_missing => {
                tracing::debug!(namespace, "Creating namespace");
                Ok(self.db.create_segment(namespace)?)
            }
            None => Err(KvError::NamespaceNotFound(namespace.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_strips_last_segment() {
        assert_eq!(parent_namespace("a::b::c", "::"), Some("a::b"));
        assert_eq!(parent_namespace("a::b", "::"), Some("a"));
    }

    #[test]
    fn top_level_namespace_has_no_parent() {
        assert_eq!(parent_namespace("a", "::"), None);
        assert_eq!(parent_namespace("", "::"), None);
    }

    #[test]
    fn leading_separator_has_root_parent() {
        assert_eq!(parent_namespace("::a", "::"), Some(""));
    }

    #[test]
    fn custom_separator() {
        assert_eq!(parent_namespace("a.b.c", "."), Some("a.b"));
        assert_eq!(parent_namespace("a::b", "."), None);
    }

    #[test]
    fn empty_separator_disables_hierarchy() {
        assert_eq!(parent_namespace("a::b", ""), None);
    }

    #[test]
    fn on_exists_defaults_to_raise() {
        assert_eq!(OnExists::default(), OnExists::Raise);
    }
}
