//! LocalSphere storage crate - SQLite persistence and live message queries.
//!
//! Provides a WAL-mode SQLite database with migrations, an append-only
//! message repository keyed by collection path, and a [`MessageStore`]
//! that pushes department-filtered snapshots to live subscribers.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod store;

pub use db::Database;
pub use repository::MessageRepository;
pub use store::{MessageStore, Snapshot, SqliteMessageStore, Subscription};
