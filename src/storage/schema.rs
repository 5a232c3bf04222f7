//! Database schema definitions and migration logic.

use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// The complete SQL schema for the poker database.
pub const SCHEMA_SQL: &str = r"
    -- Jira connections
    -- password holds an encryption envelope, never plaintext.
    CREATE TABLE IF NOT EXISTS connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT,
        api_url TEXT NOT NULL,
        username TEXT,
        password TEXT,
        story_points_field TEXT NOT NULL,
        CHECK (length(api_url) >= 1)
    );

    -- Poker sessions
    CREATE TABLE IF NOT EXISTS poker_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        poker_date TEXT,
        CHECK (length(name) >= 1)
    );

    -- Stories
    CREATE TABLE IF NOT EXISTS stories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticket_number TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        story_points REAL,
        position INTEGER NOT NULL DEFAULT 0,
        poker_session_id INTEGER,
        FOREIGN KEY (poker_session_id) REFERENCES poker_sessions(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_stories_session_position ON stories(poker_session_id, position);

    -- Metadata
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    run_migrations(conn)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Run schema migrations for existing databases.
fn run_migrations(conn: &Connection) -> Result<()> {
    // v1 databases predate story points.
    let has_story_points: bool = conn
        .prepare("SELECT 1 FROM pragma_table_info('stories') WHERE name='story_points'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !has_story_points {
        conn.execute("ALTER TABLE stories ADD COLUMN story_points REAL", [])?;
    }

    Ok(())
}
