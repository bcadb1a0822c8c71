use super::{BlobWrite, KeyValueStore, Version, VersionedBlob};
use crate::error::{Result, StoreError};
use crate::worker::SqliteWorker;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const CACHE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL
);";

fn init_cache(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CACHE_SCHEMA)?;
    // journal_mode answers with a row, so it cannot go through execute_batch
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")
}

fn current_version(conn: &Connection, key: &str) -> rusqlite::Result<Option<Version>> {
    conn.query_row(
        "SELECT version FROM cache_entries WHERE key = ?1",
        params![key],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.map(|v| v as Version))
}

/// Cache store in a SQLite file shared by every process of a deployment.
pub struct SqliteStore {
    worker: SqliteWorker,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        Ok(Self {
            worker: SqliteWorker::open(path, timeout, init_cache)?,
        })
    }

    pub fn in_memory(timeout: Duration) -> Result<Self> {
        Ok(Self {
            worker: SqliteWorker::in_memory(timeout, init_cache)?,
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<VersionedBlob>> {
        let key = key.to_string();
        self.worker.call("cache get", move |conn| {
            let row = conn
                .query_row(
                    "SELECT version, value FROM cache_entries WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok(VersionedBlob {
                            version: row.get::<_, i64>(0)? as Version,
                            bytes: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    fn set_many(&self, writes: Vec<BlobWrite>) -> Result<Vec<Version>> {
        self.worker.call_guarded("cache set_many", move |conn, guard| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = chrono::Utc::now().to_rfc3339();
            let mut versions = Vec::with_capacity(writes.len());
            for write in writes {
                let current = current_version(&tx, &write.key)?;
                if !write.expected.admits(current) {
                    // dropping the transaction rolls back earlier writes
                    return Err(StoreError::conflict(write.key));
                }
                let version = current.map_or(1, |v| v + 1);
                tx.execute(
                    "INSERT INTO cache_entries (key, version, value, updated_at)
                      VALUES (?1, ?2, ?3, ?4)
                      ON CONFLICT(key) DO UPDATE SET
                         version = excluded.version,
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                    params![write.key, version as i64, write.bytes, now],
                )?;
                versions.push(version);
            }
            guard.finish()?;
            tx.commit()?;
            Ok(versions)
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.worker.call_guarded("cache delete", move |conn, guard| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            guard.finish()?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }
}
