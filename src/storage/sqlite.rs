//! SQLite-backed ordered store
//!
//! A single `WITHOUT ROWID` table keyed by a BLOB. SQLite compares BLOBs
//! bytewise, so its primary-key B-tree is exactly the ordered key space
//! the index needs.
//!
//! # Transactions
//! - `BEGIN IMMEDIATE` takes the write lock up front, so every
//!   transaction is serializable
//! - `SQLITE_BUSY` / `SQLITE_LOCKED` surface as [`StorageError::Conflict`]
//! - Dropping an uncommitted transaction rolls it back

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{is_empty_range, KeySelector, KeyValue, KvStore, Transaction};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable ordered key-value store on SQLite
pub struct SqliteStore {
    /// std::sync::Mutex because a Connection is !Sync
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open `spatial.db` inside `data_dir`
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("spatial.db");

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self::init(conn, Some(path))?;
        tracing::info!(path = ?store.path, "Opened SQLite store");
        Ok(store)
    }

    /// Private in-memory database, gone when dropped
    pub fn in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            ) WITHOUT ROWID",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, if on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total number of stored entries
    pub fn count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl KvStore for SqliteStore {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock().map_err(StorageError::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let value = f(&mut SqliteTransaction { conn: &*tx })?;
        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }
}

struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl Transaction for SqliteTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn get_key(&mut self, selector: &KeySelector) -> StorageResult<Option<Vec<u8>>> {
        let (sql, key) = match selector {
            KeySelector::FirstGreaterOrEqual(k) => {
                ("SELECT key FROM kv WHERE key >= ?1 ORDER BY key ASC LIMIT 1", k)
            }
            KeySelector::FirstGreaterThan(k) => {
                ("SELECT key FROM kv WHERE key > ?1 ORDER BY key ASC LIMIT 1", k)
            }
            KeySelector::LastLessOrEqual(k) => {
                ("SELECT key FROM kv WHERE key <= ?1 ORDER BY key DESC LIMIT 1", k)
            }
            KeySelector::LastLessThan(k) => {
                ("SELECT key FROM kv WHERE key < ?1 ORDER BY key DESC LIMIT 1", k)
            }
        };

        let found = self
            .conn
            .prepare_cached(sql)?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(found)
    }

    fn scan(
        &mut self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<KeyValue>> {
        if is_empty_range(lower, upper) {
            return Ok(Vec::new());
        }

        let mut sql = String::from("SELECT key, value FROM kv WHERE 1 = 1");
        let mut args: Vec<&[u8]> = Vec::with_capacity(2);
        match lower {
            Bound::Included(k) => {
                sql.push_str(" AND key >= ?");
                args.push(k);
            }
            Bound::Excluded(k) => {
                sql.push_str(" AND key > ?");
                args.push(k);
            }
            Bound::Unbounded => {}
        }
        match upper {
            Bound::Included(k) => {
                sql.push_str(" AND key <= ?");
                args.push(k);
            }
            Bound::Excluded(k) => {
                sql.push_str(" AND key < ?");
                args.push(k);
            }
            Bound::Unbounded => {}
        }
        // LIMIT -1 means no limit in SQLite
        let limit = limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);
        sql.push_str(&format!(" ORDER BY key ASC LIMIT {}", limit));

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(KeyValue {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;

        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.conn
            .prepare_cached("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?
            .execute(params![key, value])?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.conn
            .prepare_cached("DELETE FROM kv WHERE key = ?1")?
            .execute(params![key])?;
        Ok(())
    }

    fn delete_range(&mut self, begin: &[u8], end: &[u8]) -> StorageResult<()> {
        self.conn
            .prepare_cached("DELETE FROM kv WHERE key >= ?1 AND key < ?2")?
            .execute(params![begin, end])?;
        Ok(())
    }
}
