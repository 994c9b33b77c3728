//! SQLite handle for the message log.
//!
//! One connection behind a Mutex. Holding the lock for a whole statement
//! is what keeps appended timestamps strictly increasing.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use localsphere_core::error::PortalError;

use crate::migrations;

/// Pragmas for an on-disk message log.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

/// Pragmas for a throwaway in-memory log.
const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// The message database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the message log at `path`, creating parent
    /// directories and applying pending migrations.
    pub fn new(path: &Path) -> Result<Self, PortalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| storage("open database", e))?;
        let db = Self::prepare(conn, FILE_PRAGMAS)?;
        info!(path = %path.display(), "Message log ready");
        Ok(db)
    }

    /// A private log that vanishes with the handle.
    pub fn in_memory() -> Result<Self, PortalError> {
        let conn = Connection::open_in_memory().map_err(|e| storage("open in-memory database", e))?;
        Self::prepare(conn, MEMORY_PRAGMAS)
    }

    fn prepare(conn: Connection, pragmas: &str) -> Result<Self, PortalError> {
        conn.execute_batch(pragmas)
            .map_err(|e| storage("apply pragmas", e))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PortalError>
    where
        F: FnOnce(&Connection) -> Result<T, PortalError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PortalError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

fn storage(action: &str, e: rusqlite::Error) -> PortalError {
    PortalError::Storage(format!("Failed to {}: {}", action, e))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_rows(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .map_err(|e| PortalError::Storage(e.to_string()))
        })
        .unwrap()
    }

    fn journal_mode(db: &Database) -> String {
        db.with_conn(|conn| {
            conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| PortalError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_log_starts_empty() {
        let db = Database::in_memory().unwrap();
        assert_eq!(message_rows(&db), 0);
        assert_eq!(journal_mode(&db), "memory");
    }

    #[test]
    fn test_file_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("city").join("portal.db");
        let db = Database::new(&path).unwrap();
        assert!(path.exists());
        assert_eq!(message_rows(&db), 0);
        assert_eq!(journal_mode(&db), "wal");
    }

    #[test]
    fn test_reopening_file_log_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.db");
        drop(Database::new(&path).unwrap());
        let db = Database::new(&path).unwrap();
        assert_eq!(message_rows(&db), 0);
    }

    #[test]
    fn test_open_on_a_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Database::new(dir.path()).unwrap_err();
        assert!(matches!(err, PortalError::Storage(_)));
    }
}
