//! Append-only message repository.
//!
//! Rows are scoped by collection path (app id + user id). Reads filter by
//! department only; narrowing to one session is the caller's job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use localsphere_core::error::PortalError;
use localsphere_core::types::{
    CollectionPath, Department, Message, MessageData, NewMessage, Role, SessionId,
};

use crate::db::Database;

/// Repository for chat messages.
#[derive(Clone, Debug)]
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message, assigning its id and server timestamp.
    ///
    /// Timestamps are strictly increasing across the whole database: a new
    /// row gets `max(now, latest + 1µs)`.
    pub fn insert(&self, path: &CollectionPath, message: NewMessage) -> Result<Message, PortalError> {
        let data_json = message
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.db.with_conn(|conn| {
            let latest: Option<i64> = conn
                .query_row("SELECT MAX(created_at) FROM messages", [], |row| row.get(0))
                .optional()
                .map_err(|e| PortalError::Storage(e.to_string()))?
                .flatten();

            let now = Utc::now().timestamp_micros();
            let created_at = match latest {
                Some(last) if last >= now => last + 1,
                _ => now,
            };

            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO messages (id, app_id, user_id, department, session_id, role, content, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.to_string(),
                    path.app_id.as_str(),
                    path.user_id,
                    message.department.as_str(),
                    message.session_id.as_str(),
                    message.role.as_str(),
                    message.content,
                    data_json,
                    created_at,
                ],
            )
            .map_err(|e| PortalError::Storage(format!("Failed to append message: {}", e)))?;

            Ok(Message {
                id,
                role: message.role,
                content: message.content,
                data: message.data,
                department: message.department,
                session_id: message.session_id,
                created_at: micros_to_datetime(created_at)?,
            })
        })
    }

    /// All messages of one department in a collection, every session included.
    ///
    /// Rows come back in document-id order, not in creation order.
    pub fn find_by_department(
        &self,
        path: &CollectionPath,
        department: Department,
    ) -> Result<Vec<Message>, PortalError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, role, content, data, department, session_id, created_at
                     FROM messages
                     WHERE app_id = ?1 AND user_id = ?2 AND department = ?3
                     ORDER BY id",
                )
                .map_err(|e| PortalError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![path.app_id.as_str(), path.user_id, department.as_str()],
                    |row| Ok(row_to_message(row)),
                )
                .map_err(|e| PortalError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| PortalError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }

    /// Count every stored message.
    pub fn count(&self) -> Result<u64, PortalError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .map_err(|e| PortalError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>, PortalError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| PortalError::Storage(format!("Invalid timestamp: {}", micros)))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, PortalError> {
    let get_err = |e: rusqlite::Error| PortalError::Storage(e.to_string());

    let id: String = row.get(0).map_err(get_err)?;
    let role: String = row.get(1).map_err(get_err)?;
    let content: String = row.get(2).map_err(get_err)?;
    let data: Option<String> = row.get(3).map_err(get_err)?;
    let department: String = row.get(4).map_err(get_err)?;
    let session_id: String = row.get(5).map_err(get_err)?;
    let created_at: i64 = row.get(6).map_err(get_err)?;

    let data = data
        .map(|json| serde_json::from_str::<MessageData>(&json))
        .transpose()?;

    Ok(Message {
        id: Uuid::parse_str(&id).map_err(|e| PortalError::Storage(e.to_string()))?,
        role: role.parse::<Role>()?,
        content,
        data,
        department: department.parse::<Department>()?,
        session_id: SessionId::new(session_id),
        created_at: micros_to_datetime(created_at)?,
    })
}
