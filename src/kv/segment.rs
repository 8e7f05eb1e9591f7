use std::collections::BTreeMap;
use std::fmt;

use super::{KvError, Result};
use crate::db::Database;
use crate::models::{EntryRecord, SegmentRecord};

/// The entries of one namespace, optionally linked to its ancestors.
///
/// Lookups (`read`, `contains`, `len`, iteration) walk up the parent chain.
/// Mutations (`write`, `remove`, `clear`) are strictly local.
#[derive(Clone)]
pub struct Segment {
    db: Database,
    record: SegmentRecord,
    parent: Option<Box<Segment>>,
}

impl Segment {
    pub(super) fn new(db: Database, record: SegmentRecord, parent: Option<Segment>) -> Self {
        Self {
            db,
            record,
            parent: parent.map(Box::new),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.record.namespace
    }

    pub fn parent(&self) -> Option<&Segment> {
        self.parent.as_deref()
    }

    /// 1 for a segment without a parent, otherwise 1 + the parent's height.
    pub fn height(&self) -> usize {
        self.lineage().count()
    }

    /// This segment followed by each of its ancestors.
    fn lineage(&self) -> impl Iterator<Item = &Segment> {
        std::iter::successors(Some(self), |segment| segment.parent())
    }

    /// Value for `key` from the nearest segment that has it.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        for segment in self.lineage() {
            if let Some(entry) = self.db.get_entry(segment.record.id, key)? {
                return Ok(entry.value);
            }
        }
        Err(KvError::KeyNotFound {
            namespace: self.namespace().to_string(),
            key: key.to_string(),
        })
    }

    pub fn read_or(&self, key: &str, default: Option<String>) -> Result<Option<String>> {
        match self.read(key) {
            Ok(value) => Ok(value),
            Err(KvError::KeyNotFound { .. }) => Ok(default),
            Err(e) => Err(e),
        }
    }

    pub fn write<'a>(&self, key: &str, value: impl Into<Option<&'a str>>) -> Result<()> {
        self.db.put_entry(self.record.id, key, value.into())?;
        Ok(())
    }

    /// Removes `key` from this segment only. Ancestors are never searched.
    pub fn remove(&self, key: &str) -> Result<()> {
        if self.db.delete_entry(self.record.id, key)? {
            Ok(())
        } else {
            Err(KvError::KeyNotFound {
                namespace: self.namespace().to_string(),
                key: key.to_string(),
            })
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        for segment in self.lineage() {
            if self.db.get_entry(segment.record.id, key)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Local entry count plus the parent's length. Keys shadowed by a
    /// descendant are counted once per segment that holds them.
    pub fn len(&self) -> Result<usize> {
        let mut total = 0;
        for segment in self.lineage() {
            total += self.db.count_entries(segment.record.id)?;
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Local entries followed by each ancestor's, without de-duplication.
    pub fn items(&self) -> Result<impl Iterator<Item = (String, Option<String>)>> {
        Ok(self
            .levels()?
            .into_iter()
            .flatten()
            .map(|entry| (entry.key, entry.value)))
    }

    pub fn keys(&self) -> Result<impl Iterator<Item = String>> {
        Ok(self.items()?.map(|(key, _)| key))
    }

    pub fn values(&self) -> Result<impl Iterator<Item = Option<String>>> {
        Ok(self.items()?.map(|(_, value)| value))
    }

    /// De-duplicated view of this segment and its ancestors. The nearest
    /// segment wins when a key appears more than once.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Option<String>>> {
        let mut view = BTreeMap::new();
        for level in self.levels()?.into_iter().rev() {
            for entry in level {
                view.insert(entry.key, entry.value);
            }
        }
        Ok(view)
    }

    /// Deletes every local entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.db.clear_entries(self.record.id)?)
    }

    fn levels(&self) -> Result<Vec<Vec<EntryRecord>>> {
        self.lineage()
            .map(|segment| self.db.get_entries(segment.record.id).map_err(KvError::from))
            .collect()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("namespace", &self.record.namespace)
            .field("parent", &self.parent().map(Segment::namespace))
            .finish()
    }
}
