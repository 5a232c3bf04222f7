//! `SQLite` persistence for connections, poker sessions and stories.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStorage;
