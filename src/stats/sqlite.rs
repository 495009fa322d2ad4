//! SQLite-backed term statistics store
//!
//! One database file per shard. The build opens stores read-write; query
//! time opens them read-only.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::debug;

use crate::error::{Result, ShardselError};
use crate::stats::store::StatStore;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS term_stats (
    key   TEXT PRIMARY KEY,
    value REAL NOT NULL
) WITHOUT ROWID;";

const UPSERT: &str = "INSERT INTO term_stats (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

const ACCUMULATE: &str = "INSERT INTO term_stats (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = value + excluded.value";

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Idle read-only connections kept per store; extras are closed on return.
const MAX_IDLE_READERS: usize = 8;

/// Term statistics for one shard in a single SQLite file.
pub struct SqliteStatStore {
    handle: Handle,
    path: PathBuf,
    mode: OpenMode,
}

/// The build writes through one serialized connection; readers each check
/// out their own so concurrent lookups never wait on one another.
enum Handle {
    Writer(Mutex<Connection>),
    Readers(Mutex<Vec<Connection>>),
}

impl std::fmt::Debug for SqliteStatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStatStore")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SqliteStatStore {
    /// Open (creating if needed) a store for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;",
        )?;
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), "opened statistics store for writing");
        Ok(Self {
            handle: Handle::Writer(Mutex::new(conn)),
            path: path.to_path_buf(),
            mode: OpenMode::ReadWrite,
        })
    }

    /// Open an existing store read-only. Fails when the file is missing.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ShardselError::StatsUnavailable(format!(
                "store not found: {}",
                path.display()
            )));
        }

        let conn = open_reader(path)?;
        // Touch the table so a file without the schema fails here, not mid-query.
        conn.query_row("SELECT COUNT(*) FROM term_stats LIMIT 1", [], |row| {
            row.get::<_, i64>(0)
        })?;

        Ok(Self {
            handle: Handle::Readers(Mutex::new(vec![conn])),
            path: path.to_path_buf(),
            mode: OpenMode::ReadOnly,
        })
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            handle: Handle::Writer(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
            mode: OpenMode::ReadWrite,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Fold the WAL back into the main file so the store is a single
    /// self-contained file before it is moved into place.
    pub fn finish(self) -> Result<()> {
        if let Handle::Writer(conn) = self.handle {
            let conn = conn.into_inner();
            conn.execute_batch(
                "PRAGMA wal_checkpoint(TRUNCATE);
                 PRAGMA journal_mode = DELETE;",
            )?;
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    fn writer(&self) -> Result<&Mutex<Connection>> {
        match &self.handle {
            Handle::Writer(conn) => Ok(conn),
            Handle::Readers(_) => Err(ShardselError::InvalidArgument(format!(
                "statistics store {} is read-only",
                self.path.display()
            ))),
        }
    }

    /// Run `f` on a connection suitable for reads. Read-only stores hand
    /// each caller its own connection and only lock to check it out.
    fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let idle = match &self.handle {
            Handle::Writer(conn) => return f(&conn.lock()),
            Handle::Readers(idle) => idle,
        };

        let pooled = idle.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => open_reader(&self.path)?,
        };
        let result = f(&conn);

        let mut idle = idle.lock();
        if idle.len() < MAX_IDLE_READERS {
            idle.push(conn);
        }
        result
    }

    fn write_batch(&self, sql: &str, entries: &[(String, f64)]) -> Result<()> {
        let mut conn = self.writer()?.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl StatStore for SqliteStatStore {
    fn get(&self, key: &str) -> Result<Option<f64>> {
        self.with_reader(|conn| {
            let mut stmt = conn.prepare_cached("SELECT value FROM term_stats WHERE key = ?1")?;
            let value = stmt
                .query_row([key], |row| row.get::<_, f64>(0))
                .optional()?;
            Ok(value)
        })
    }

    fn put(&self, key: &str, value: f64) -> Result<()> {
        let conn = self.writer()?.lock();
        conn.prepare_cached(UPSERT)?.execute(params![key, value])?;
        Ok(())
    }

    fn add_value(&self, key: &str, delta: f64) -> Result<()> {
        let conn = self.writer()?.lock();
        conn.prepare_cached(ACCUMULATE)?.execute(params![key, delta])?;
        Ok(())
    }

    fn put_batch(&self, entries: &[(String, f64)]) -> Result<()> {
        self.write_batch(UPSERT, entries)
    }

    fn add_batch(&self, deltas: &[(String, f64)]) -> Result<()> {
        self.write_batch(ACCUMULATE, deltas)
    }

    fn entries(&self) -> Result<Vec<(String, f64)>> {
        self.with_reader(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM term_stats ORDER BY key")?;
            let rows =
                stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

fn open_reader(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.execute_batch(
        "PRAGMA cache_size = -16000;
         PRAGMA mmap_size = 268435456;",
    )?;
    Ok(conn)
}
