//! Schema bootstrap for the key-value tables.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each entry of
//! [`STEPS`] moves the schema forward by one version and runs in its own
//! transaction together with the version bump.

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Ordered upgrade steps; step `i` produces schema version `i + 1`.
const STEPS: &[(&str, &str)] = &[("kv tables", include_str!("migrations/001_initial.sql"))];

/// Newest schema version this build understands.
pub const SCHEMA_VERSION: u32 = STEPS.len() as u32;

pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("Failed to read schema version")?;
    Ok(version)
}

/// Brings the schema up to [`SCHEMA_VERSION`]. A database written by a newer
/// build is refused rather than touched.
pub fn upgrade(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        bail!(
            "Database schema version {} is newer than supported version {}",
            current,
            SCHEMA_VERSION
        );
    }

    for (index, (label, sql)) in STEPS.iter().enumerate().skip(current as usize) {
        let target = index as u32 + 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("Failed to apply schema step {} ({})", target, label))?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
        tracing::info!(version = target, step = *label, "Schema upgraded");
    }

    Ok(())
}
