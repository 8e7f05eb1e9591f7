use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted namespace.
///
/// Segments are created lazily the first time a namespace is fetched with
/// creation enabled or written to. Deleting a segment deletes its entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentRecord {
    pub id: Uuid,
    /// The full namespace string, e.g. `app::module`. The root namespace is `""`.
    pub namespace: String,
    pub created_at: DateTime<Utc>,
}

/// A single key/value pair stored in a segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryRecord {
    pub key: String,
    /// Values are optional; a present-but-null value is distinct from a missing key.
    pub value: Option<String>,
    pub updated_at: DateTime<Utc>,
}
