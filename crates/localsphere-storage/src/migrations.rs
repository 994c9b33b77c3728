//! Database schema migrations.
//!
//! Applies the initial schema: the append-only `messages` table and the
//! `schema_migrations` bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use localsphere_core::error::PortalError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), PortalError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| PortalError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| PortalError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: messages");
    }

    Ok(())
}

/// Version 1: message collections.
///
/// `created_at` holds microseconds since the Unix epoch and is assigned by
/// the repository, never by the client.
fn apply_v1(conn: &Connection) -> Result<(), PortalError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY NOT NULL,
            app_id      TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            department  TEXT NOT NULL
                        CHECK (department IN ('home', 'tax', 'vehicle', 'benefits', 'housing')),
            session_id  TEXT NOT NULL,
            role        TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content     TEXT NOT NULL,
            data        TEXT,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_collection_department
            ON messages (app_id, user_id, department);

        CREATE TRIGGER IF NOT EXISTS messages_no_update
            BEFORE UPDATE ON messages
            BEGIN
                SELECT RAISE(ABORT, 'messages are append-only');
            END;

        CREATE TRIGGER IF NOT EXISTS messages_no_delete
            BEFORE DELETE ON messages
            BEGIN
                SELECT RAISE(ABORT, 'messages are append-only');
            END;

        INSERT INTO schema_migrations (version, name) VALUES (1, 'messages');
        ",
    )
    .map_err(|e| PortalError::Storage(format!("Migration v1 failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    fn insert_sample(conn: &Connection) {
        conn.execute(
            "INSERT INTO messages (id, app_id, user_id, department, session_id, role, content, created_at)
             VALUES ('m1', 'app', 'u1', 'tax', 's1', 'user', 'hello', 1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_messages_reject_update() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        insert_sample(&conn);
        let result = conn.execute("UPDATE messages SET content = 'edited' WHERE id = 'm1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_messages_reject_delete() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        insert_sample(&conn);
        assert!(conn.execute("DELETE FROM messages", []).is_err());
    }

    #[test]
    fn test_unknown_department_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO messages (id, app_id, user_id, department, session_id, role, content, created_at)
             VALUES ('m2', 'app', 'u1', 'parks', 's1', 'user', 'hello', 1)",
            [],
        );
        assert!(result.is_err());
    }
}
