/// Catalog database module
///
/// The Database wraps the SQLite connection that holds the whole mosaic
/// catalog: aspects, indexed images, covers, cells, macros, signatures
/// and resolved mosaics. Schema setup runs through ordered migrations
/// (migrate.rs) applied once at open.

pub mod migrate;

use rusqlite::{Connection, Result as SqlResult};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// The Database owns the SQLite catalog connection.
///
/// SQLite is not safe for concurrent writes, so every service funnels its
/// statements through the connection lock; find-or-create critical
/// sections additionally serialize per service (see service/).
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the catalog at `path` and bring the schema up to
    /// the current migration version.
    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let db_path = path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .expect("Failed to create catalog data directory");
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::init(conn, db_path)
    }

    /// Open an in-memory catalog. Used by tests and throwaway runs.
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version = migrate::migrate(&conn)?;
        println!(
            "📁 Mosaic catalog at {} (schema version {})",
            db_path.display(),
            version
        );
        Ok(Database {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Default catalog location in the user's data directory:
    /// - Linux: ~/.local/share/mosaicize/catalog.db
    /// - macOS: ~/Library/Application Support/mosaicize/catalog.db
    /// - Windows: %APPDATA%\mosaicize\catalog.db
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("mosaicize");
        path.push("catalog.db");
        path
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Lock the catalog connection. A poisoned lock only means another
    /// thread panicked mid-query; the connection itself is still usable.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_path", &self.db_path)
            .finish()
    }
}
