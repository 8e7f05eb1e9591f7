mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::upgrade(&conn)
    }

    // ============================================================
    // Segment operations
    // ============================================================

    pub fn get_segment(&self, namespace: &str) -> Result<Option<SegmentRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let segment = conn
            .query_row(
                "SELECT id, namespace, created_at FROM kv_segments WHERE namespace = ?",
                [namespace],
                |row| {
                    Ok(SegmentRecord {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        namespace: row.get(1)?,
                        created_at: parse_datetime(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(segment)
    }

    pub fn get_all_segments(&self) -> Result<Vec<SegmentRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, namespace, created_at FROM kv_segments ORDER BY namespace",
        )?;

        let segments = stmt
            .query_map([], |row| {
                Ok(SegmentRecord {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    namespace: row.get(1)?,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(segments)
    }

    pub fn create_segment(&self, namespace: &str) -> Result<SegmentRecord> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO kv_segments (id, namespace, created_at) VALUES (?, ?, ?)",
            (id.to_string(), namespace, now.to_rfc3339()),
        )?;

        Ok(SegmentRecord {
            id,
            namespace: namespace.to_string(),
            created_at: now,
        })
    }

    /// Deletes the segment for `namespace` together with its entries.
    /// Returns false if no such segment exists.
    pub fn delete_segment(&self, namespace: &str) -> Result<bool> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM kv_entries WHERE segment_id IN
                (SELECT id FROM kv_segments WHERE namespace = ?)",
            [namespace],
        )?;
        let rows = tx.execute("DELETE FROM kv_segments WHERE namespace = ?", [namespace])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // ============================================================
    // Entry operations
    // ============================================================

    pub fn get_entry(&self, segment_id: Uuid, key: &str) -> Result<Option<EntryRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let entry = conn
            .query_row(
                "SELECT key, value, updated_at FROM kv_entries WHERE segment_id = ? AND key = ?",
                (segment_id.to_string(), key),
                |row| {
                    Ok(EntryRecord {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: parse_datetime(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(entry)
    }

    /// Entries of one segment in insertion order.
    pub fn get_entries(&self, segment_id: Uuid) -> Result<Vec<EntryRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT key, value, updated_at FROM kv_entries WHERE segment_id = ? ORDER BY rowid",
        )?;

        let entries = stmt
            .query_map([segment_id.to_string()], |row| {
                Ok(EntryRecord {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    pub fn count_entries(&self, segment_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE segment_id = ?",
            [segment_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Inserts or overwrites a single entry. An overwritten entry keeps its position.
    pub fn put_entry(&self, segment_id: Uuid, key: &str, value: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO kv_entries (segment_id, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(segment_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            (segment_id.to_string(), key, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn delete_entry(&self, segment_id: Uuid, key: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM kv_entries WHERE segment_id = ? AND key = ?",
            (segment_id.to_string(), key),
        )?;
        Ok(rows > 0)
    }

    pub fn clear_entries(&self, segment_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM kv_entries WHERE segment_id = ?",
            [segment_id.to_string()],
        )?;
        Ok(rows)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Location of the database when no path is configured.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "slashkv")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("slashkv.db"))
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
