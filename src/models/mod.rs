//! Persisted records for the key-value store.
//!
//! # Core Concepts
//!
//! - [`SegmentRecord`]: one row per namespace. The namespace string is unique; the
//!   hierarchy between namespaces is never stored, it is derived from the string.
//! - [`EntryRecord`]: a key/value pair owned by exactly one segment. Keys are unique
//!   within their segment only, so an ancestor may hold the same key as a descendant.

mod segment;

pub use segment::*;
