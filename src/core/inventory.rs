//! Inventory store: durable `path -> (size, mtime)` index
//!
//! The scanner is the only writer; the archiver and orchestrator only read.
//! `SqliteInventory` is the durable backend, `MemoryInventory` lets tests
//! substitute an in-process map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Result type for inventory operations
pub type InventoryResult<T> = std::result::Result<T, InventoryError>;

/// Errors raised by an inventory backend
#[derive(Error, Debug)]
pub enum InventoryError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored path is not valid UTF-8
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// Stored size does not fit the column type
    #[error("Size out of range for {path}: {size}")]
    SizeOutOfRange { path: PathBuf, size: u64 },

    /// In-memory store lock was poisoned by a panicking thread
    #[error("Inventory lock poisoned")]
    Poisoned,
}

/// One indexed regular file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

/// Size predicate for inventory queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeQuery {
    /// `size < threshold`
    Below(u64),
    /// `size >= threshold`
    AtLeast(u64),
}

impl SizeQuery {
    pub fn matches(&self, size: u64) -> bool {
        match *self {
            SizeQuery::Below(threshold) => size < threshold,
            SizeQuery::AtLeast(threshold) => size >= threshold,
        }
    }
}

/// Storage contract shared by every inventory backend
pub trait InventoryStore {
    /// Insert or overwrite the record keyed by `record.path`
    fn upsert(&self, record: &FileRecord) -> InventoryResult<()>;

    /// Paths whose recorded size satisfies `query`, ordered by path
    fn query_by_size(&self, query: SizeQuery) -> InventoryResult<Vec<PathBuf>>;

    /// Look up a single record
    fn get(&self, path: &Path) -> InventoryResult<Option<FileRecord>>;

    /// Number of records held
    fn len(&self) -> InventoryResult<usize>;
}

fn path_key(path: &Path) -> InventoryResult<&str> {
    path.to_str()
        .ok_or_else(|| InventoryError::NonUtf8Path(path.to_path_buf()))
}

fn size_column(path: &Path, size: u64) -> InventoryResult<i64> {
    i64::try_from(size).map_err(|_| InventoryError::SizeOutOfRange {
        path: path.to_path_buf(),
        size,
    })
}

/// SQLite-backed inventory
pub struct SqliteInventory {
    conn: Connection,
}

impl SqliteInventory {
    /// Open or create the inventory database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> InventoryResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> InventoryResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> InventoryResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS file_index (
                path  TEXT PRIMARY KEY,
                size  INTEGER NOT NULL,
                mtime TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS file_index_size ON file_index(size);",
        )?;
        Ok(Self { conn })
    }

    /// Release the connection, surfacing any error SQLite reports on close
    pub fn close(self) -> InventoryResult<()> {
        self.conn.close().map_err(|(_, err)| InventoryError::Sqlite(err))
    }
}

impl InventoryStore for SqliteInventory {
    fn upsert(&self, record: &FileRecord) -> InventoryResult<()> {
        let key = path_key(&record.path)?;
        let size = size_column(&record.path, record.size)?;
        self.conn.execute(
            "INSERT INTO file_index (path, size, mtime) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET size = excluded.size, mtime = excluded.mtime",
            params![key, size, record.mtime],
        )?;
        Ok(())
    }

    fn query_by_size(&self, query: SizeQuery) -> InventoryResult<Vec<PathBuf>> {
        let (sql, threshold) = match query {
            SizeQuery::Below(t) => ("SELECT path FROM file_index WHERE size < ?1 ORDER BY path", t),
            SizeQuery::AtLeast(t) => {
                ("SELECT path FROM file_index WHERE size >= ?1 ORDER BY path", t)
            }
        };
        // Thresholds past i64::MAX select every row (Below) or none (AtLeast)
        let threshold = i64::try_from(threshold).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![threshold], |row| row.get::<_, String>(0))?;
        let mut paths = Vec::new();
        for row in rows {
            paths.push(PathBuf::from(row?));
        }
        Ok(paths)
    }

    fn get(&self, path: &Path) -> InventoryResult<Option<FileRecord>> {
        let key = path_key(path)?;
        let record = self
            .conn
            .query_row(
                "SELECT size, mtime FROM file_index WHERE path = ?1",
                params![key],
                |row| {
                    let size: i64 = row.get(0)?;
                    let mtime: DateTime<Utc> = row.get(1)?;
                    Ok((size, mtime))
                },
            )
            .optional()?;

        Ok(record.map(|(size, mtime)| FileRecord {
            path: path.to_path_buf(),
            size: size.max(0) as u64,
            mtime,
        }))
    }

    fn len(&self) -> InventoryResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM file_index", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

/// In-memory inventory
#[derive(Default)]
pub struct MemoryInventory {
    records: Mutex<BTreeMap<PathBuf, FileRecord>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> InventoryResult<std::sync::MutexGuard<'_, BTreeMap<PathBuf, FileRecord>>> {
        self.records.lock().map_err(|_| InventoryError::Poisoned)
    }
}

impl InventoryStore for MemoryInventory {
    fn upsert(&self, record: &FileRecord) -> InventoryResult<()> {
        self.lock()?.insert(record.path.clone(), record.clone());
        Ok(())
    }

    fn query_by_size(&self, query: SizeQuery) -> InventoryResult<Vec<PathBuf>> {
        Ok(self
            .lock()?
            .values()
            .filter(|record| query.matches(record.size))
            .map(|record| record.path.clone())
            .collect())
    }

    fn get(&self, path: &Path) -> InventoryResult<Option<FileRecord>> {
        Ok(self.lock()?.get(path).cloned())
    }

    fn len(&self) -> InventoryResult<usize> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            mtime: Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap(),
        }
    }

    fn exercise_store(store: &dyn InventoryStore) {
        store.upsert(&record("/src/a.txt", 10)).unwrap();
        store.upsert(&record("/src/b.bin", 100)).unwrap();
        store.upsert(&record("/src/c.bin", 101)).unwrap();

        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(
            store.query_by_size(SizeQuery::Below(100)).unwrap(),
            vec![PathBuf::from("/src/a.txt")]
        );
        assert_eq!(
            store.query_by_size(SizeQuery::AtLeast(100)).unwrap(),
            vec![PathBuf::from("/src/b.bin"), PathBuf::from("/src/c.bin")]
        );

        // Upsert overwrites in place
        store.upsert(&record("/src/b.bin", 5)).unwrap();
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.get(Path::new("/src/b.bin")).unwrap().unwrap().size, 5);
        assert_eq!(store.query_by_size(SizeQuery::Below(100)).unwrap().len(), 2);

        assert!(store.get(Path::new("/src/missing")).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_contract() {
        let store = SqliteInventory::open_in_memory().unwrap();
        exercise_store(&store);
        store.close().unwrap();
    }

    #[test]
    fn test_memory_contract() {
        exercise_store(&MemoryInventory::new());
    }

    #[test]
    fn test_mtime_survives_storage() {
        let store = SqliteInventory::open_in_memory().unwrap();
        let original = record("/src/a.txt", 10);
        store.upsert(&original).unwrap();
        assert_eq!(store.get(&original.path).unwrap().unwrap(), original);
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("file_index.db");

        let store = SqliteInventory::open(&db).unwrap();
        store.upsert(&record("/src/a.txt", 10)).unwrap();
        store.close().unwrap();

        let store = SqliteInventory::open(&db).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        store.upsert(&record("/src/a.txt", 10)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_open_fails_on_directory() {
        let dir = tempdir().unwrap();
        assert!(SqliteInventory::open(dir.path()).is_err());
    }

    #[test]
    fn test_huge_threshold() {
        let store = SqliteInventory::open_in_memory().unwrap();
        store.upsert(&record("/src/a.txt", 10)).unwrap();
        assert_eq!(store.query_by_size(SizeQuery::Below(u64::MAX)).unwrap().len(), 1);
        assert!(store.query_by_size(SizeQuery::AtLeast(u64::MAX)).unwrap().is_empty());
    }
}
