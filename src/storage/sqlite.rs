//! `SQLite` storage implementation.

use crate::error::{PokerError, Result};
use crate::model::{
    ConnectionRecord, ConnectionUpdate, NewConnection, NewStory, PokerSession, Story,
};
use crate::secret::FieldCipher;
use crate::storage::schema::apply_schema;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Longest value accepted for connection text fields.
pub const MAX_FIELD_LEN: usize = 200;

const STORY_COLUMNS: &str =
    "id, ticket_number, title, description, story_points, position, poker_session_id";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    cipher: FieldCipher,
}

/// Connection row as stored, password still sealed.
struct StoredConnection {
    id: i64,
    label: Option<String>,
    api_url: String,
    username: Option<String>,
    password: Option<String>,
    story_points_field: String,
}

impl SqliteStorage {
    /// Open a new connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open(path: &Path, cipher: FieldCipher) -> Result<Self> {
        Self::open_with_timeout(path, cipher, None)
    }

    /// Open a new connection with an optional busy timeout (ms).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open_with_timeout(
        path: &Path,
        cipher: FieldCipher,
        lock_timeout_ms: Option<u64>,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        }
        apply_schema(&conn)?;
        Ok(Self { conn, cipher })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory(cipher: FieldCipher) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn, cipher })
    }

    /// Run `f` inside an immediate transaction; roll back if it fails.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` or from committing.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &FieldCipher) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx, &self.cipher)?;
        tx.commit()?;
        debug!(op, "Committed");
        Ok(result)
    }

    // === Connections ===

    /// Store a new connection, encrypting its password.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty or over-long fields.
    pub fn create_connection(&mut self, new: &NewConnection) -> Result<ConnectionRecord> {
        validate_connection(&new.preview())?;
        let id = self.mutate("create_connection", |tx, cipher| {
            let sealed = seal(cipher, new.password.as_deref())?;
            tx.execute(
                "INSERT INTO connections (label, api_url, username, password, story_points_field)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    blank_to_none(new.label.as_deref()),
                    new.api_url.trim(),
                    blank_to_none(new.username.as_deref()),
                    sealed,
                    new.story_points_field.trim(),
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })?;
        self.require_connection(id)
    }

    /// Get a connection by ID, with its password decrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the password cannot be decrypted.
    pub fn get_connection(&self, id: i64) -> Result<Option<ConnectionRecord>> {
        let stored = self
            .conn
            .query_row(
                "SELECT id, label, api_url, username, password, story_points_field
                 FROM connections WHERE id = ?",
                [id],
                stored_connection_from_row,
            )
            .optional()?;
        stored.map(|row| self.unseal(row)).transpose()
    }

    /// Get a connection by ID or fail with `ConnectionNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionNotFound` if no such connection exists.
    pub fn require_connection(&self, id: i64) -> Result<ConnectionRecord> {
        self.get_connection(id)?
            .ok_or(PokerError::ConnectionNotFound { id })
    }

    /// List all connections ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a password cannot be decrypted.
    pub fn list_connections(&self) -> Result<Vec<ConnectionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, api_url, username, password, story_points_field
             FROM connections ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], stored_connection_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|row| self.unseal(row)).collect()
    }

    /// Apply a partial update. Fields left as `None` keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionNotFound` or a validation error.
    pub fn update_connection(
        &mut self,
        id: i64,
        update: &ConnectionUpdate,
    ) -> Result<ConnectionRecord> {
        let current = self.require_connection(id)?;
        let next = current.with_update(update);
        validate_connection(&next)?;

        self.mutate("update_connection", |tx, cipher| {
            tx.execute(
                "UPDATE connections SET label = ?, api_url = ?, username = ?, story_points_field = ?
                 WHERE id = ?",
                params![
                    blank_to_none(next.label.as_deref()),
                    next.api_url.trim(),
                    blank_to_none(next.username.as_deref()),
                    next.story_points_field.trim(),
                    id,
                ],
            )?;
            if let Some(password) = &update.password {
                let sealed = seal(cipher, password.as_deref())?;
                tx.execute(
                    "UPDATE connections SET password = ? WHERE id = ?",
                    params![sealed, id],
                )?;
            }
            Ok(())
        })?;
        self.require_connection(id)
    }

    /// Delete a connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionNotFound` if nothing was deleted.
    pub fn delete_connection(&mut self, id: i64) -> Result<()> {
        let deleted = self.mutate("delete_connection", |tx, _| {
            Ok(tx.execute("DELETE FROM connections WHERE id = ?", [id])?)
        })?;
        if deleted == 0 {
            return Err(PokerError::ConnectionNotFound { id });
        }
        Ok(())
    }

    fn unseal(&self, row: StoredConnection) -> Result<ConnectionRecord> {
        let password = row
            .password
            .as_deref()
            .map(|sealed| self.cipher.decrypt(sealed))
            .transpose()?;
        Ok(ConnectionRecord {
            id: row.id,
            label: row.label,
            api_url: row.api_url,
            username: row.username,
            password,
            story_points_field: row.story_points_field,
        })
    }

    // === Poker sessions ===

    /// Create a poker session.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is empty.
    pub fn create_session(
        &mut self,
        name: &str,
        poker_date: Option<NaiveDate>,
    ) -> Result<PokerSession> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PokerError::validation("name", "cannot be empty"));
        }
        let id = self.mutate("create_session", |tx, _| {
            tx.execute(
                "INSERT INTO poker_sessions (name, poker_date) VALUES (?, ?)",
                params![name, poker_date.map(|d| d.format(DATE_FORMAT).to_string())],
            )?;
            Ok(tx.last_insert_rowid())
        })?;
        Ok(PokerSession {
            id,
            name: name.to_string(),
            poker_date,
        })
    }

    /// Get a poker session by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_session(&self, id: i64) -> Result<Option<PokerSession>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, poker_date FROM poker_sessions WHERE id = ?",
                [id],
                session_from_row,
            )
            .optional()?)
    }

    /// Get a poker session by ID or fail with `SessionNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no such session exists.
    pub fn require_session(&self, id: i64) -> Result<PokerSession> {
        self.get_session(id)?
            .ok_or(PokerError::SessionNotFound { id })
    }

    /// List poker sessions, newest date first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_sessions(&self) -> Result<Vec<PokerSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, poker_date FROM poker_sessions
             ORDER BY poker_date IS NULL, poker_date DESC, id",
        )?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Delete a poker session. Its stories are detached, not deleted.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if nothing was deleted.
    pub fn delete_session(&mut self, id: i64) -> Result<()> {
        let deleted = self.mutate("delete_session", |tx, _| {
            Ok(tx.execute("DELETE FROM poker_sessions WHERE id = ?", [id])?)
        })?;
        if deleted == 0 {
            return Err(PokerError::SessionNotFound { id });
        }
        Ok(())
    }

    // === Stories ===

    /// Highest story position in a session, `None` if it has no stories or
    /// no session is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn max_story_position(&self, session_id: Option<i64>) -> Result<Option<i64>> {
        let Some(session_id) = session_id else {
            return Ok(None);
        };
        Ok(self.conn.query_row(
            "SELECT MAX(position) FROM stories WHERE poker_session_id = ?",
            [session_id],
            |row| row.get(0),
        )?)
    }

    /// Insert stories in a single transaction, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is stored in that case.
    pub fn insert_stories(&mut self, stories: &[NewStory]) -> Result<Vec<Story>> {
        self.mutate("insert_stories", |tx, _| {
            let mut stmt = tx.prepare(
                "INSERT INTO stories (ticket_number, title, description, position, poker_session_id)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            let mut created = Vec::with_capacity(stories.len());
            for story in stories {
                stmt.execute(params![
                    story.ticket_number,
                    story.title,
                    story.description,
                    story.position,
                    story.poker_session_id,
                ])?;
                created.push(Story {
                    id: tx.last_insert_rowid(),
                    ticket_number: story.ticket_number.clone(),
                    title: story.title.clone(),
                    description: story.description.clone(),
                    story_points: None,
                    position: story.position,
                    poker_session_id: story.poker_session_id,
                });
            }
            Ok(created)
        })
    }

    /// Get a story by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_story(&self, id: i64) -> Result<Option<Story>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = ?"),
                [id],
                story_from_row,
            )
            .optional()?)
    }

    /// Get a story by ID or fail with `StoryNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `StoryNotFound` if no such story exists.
    pub fn require_story(&self, id: i64) -> Result<Story> {
        self.get_story(id)?.ok_or(PokerError::StoryNotFound { id })
    }

    /// List stories, optionally restricted to one session, ordered by session
    /// then position.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_stories(&self, session_id: Option<i64>) -> Result<Vec<Story>> {
        let stories = if let Some(session_id) = session_id {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE poker_session_id = ?
                 ORDER BY position, id"
            ))?;
            stmt.query_map([session_id], story_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {STORY_COLUMNS} FROM stories
                 ORDER BY poker_session_id IS NULL, poker_session_id, position, id"
            ))?;
            stmt.query_map([], story_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(stories)
    }

    /// Load stories by ID, keeping the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `StoryNotFound` for the first missing ID.
    pub fn stories_by_ids(&self, ids: &[i64]) -> Result<Vec<Story>> {
        ids.iter().map(|&id| self.require_story(id)).collect()
    }

    /// Set or clear the story points of a story.
    ///
    /// # Errors
    ///
    /// Returns `StoryNotFound` or a validation error for non-finite values.
    pub fn set_story_points(&mut self, id: i64, points: Option<f64>) -> Result<Story> {
        if points.is_some_and(|p| !p.is_finite()) {
            return Err(PokerError::validation("story_points", "must be a finite number"));
        }
        let updated = self.mutate("set_story_points", |tx, _| {
            Ok(tx.execute(
                "UPDATE stories SET story_points = ? WHERE id = ?",
                params![points, id],
            )?)
        })?;
        if updated == 0 {
            return Err(PokerError::StoryNotFound { id });
        }
        self.require_story(id)
    }

    /// Delete a story.
    ///
    /// # Errors
    ///
    /// Returns `StoryNotFound` if nothing was deleted.
    pub fn delete_story(&mut self, id: i64) -> Result<()> {
        let deleted = self.mutate("delete_story", |tx, _| {
            Ok(tx.execute("DELETE FROM stories WHERE id = ?", [id])?)
        })?;
        if deleted == 0 {
            return Err(PokerError::StoryNotFound { id });
        }
        Ok(())
    }
}

fn stored_connection_from_row(row: &Row<'_>) -> rusqlite::Result<StoredConnection> {
    Ok(StoredConnection {
        id: row.get(0)?,
        label: row.get(1)?,
        api_url: row.get(2)?,
        username: row.get(3)?,
        password: row.get(4)?,
        story_points_field: row.get(5)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<PokerSession> {
    let poker_date = row
        .get::<_, Option<String>>(2)?
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
            })
        })
        .transpose()?;
    Ok(PokerSession {
        id: row.get(0)?,
        name: row.get(1)?,
        poker_date,
    })
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    Ok(Story {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        story_points: row.get(4)?,
        position: row.get(5)?,
        poker_session_id: row.get(6)?,
    })
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn seal(cipher: &FieldCipher, password: Option<&str>) -> Result<Option<String>> {
    blank_to_none(password)
        .map(|plain| cipher.encrypt(plain))
        .transpose()
}

fn validate_connection(record: &ConnectionRecord) -> Result<()> {
    if record.api_url.trim().is_empty() {
        return Err(PokerError::validation("api_url", "cannot be empty"));
    }
    if record.story_points_field.trim().is_empty() {
        return Err(PokerError::validation("story_points_field", "cannot be empty"));
    }
    let fields = [
        ("label", record.label.as_deref()),
        ("api_url", Some(record.api_url.as_str())),
        ("username", record.username.as_deref()),
        ("password", record.password.as_deref()),
        ("story_points_field", Some(record.story_points_field.as_str())),
    ];
    for (field, value) in fields {
        if value.is_some_and(|v| v.chars().count() > MAX_FIELD_LEN) {
            return Err(PokerError::validation(
                field,
                format!("must be at most {MAX_FIELD_LEN} characters"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SqliteStorage {
        SqliteStorage::open_memory(FieldCipher::new(["test-key"]).unwrap()).unwrap()
    }

    fn new_connection() -> NewConnection {
        NewConnection {
            label: Some("Test Jira".to_string()),
            api_url: "https://jira.example.com".to_string(),
            username: Some("testuser".to_string()),
            password: Some("supersecret".to_string()),
            story_points_field: "customfield_10002".to_string(),
        }
    }

    fn new_story(ticket: &str, position: i64, session: Option<i64>) -> NewStory {
        NewStory {
            ticket_number: ticket.to_string(),
            title: format!("Title {ticket}"),
            description: String::new(),
            position,
            poker_session_id: session,
        }
    }

    #[test]
    fn password_is_sealed_at_rest() {
        let mut storage = storage();
        let created = storage.create_connection(&new_connection()).unwrap();
        assert_eq!(created.password.as_deref(), Some("supersecret"));

        let raw: String = storage
            .conn
            .query_row(
                "SELECT password FROM connections WHERE id = ?",
                [created.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(raw, "supersecret");
        assert!(crate::secret::is_encrypted(&raw));
    }

    #[test]
    fn empty_password_is_stored_as_null() {
        let mut storage = storage();
        let mut new = new_connection();
        new.password = Some(String::new());
        let created = storage.create_connection(&new).unwrap();
        assert_eq!(created.password, None);
    }

    #[test]
    fn update_keeps_password_unless_given() {
        let mut storage = storage();
        let id = storage.create_connection(&new_connection()).unwrap().id;

        let renamed = storage
            .update_connection(
                id,
                &ConnectionUpdate {
                    label: Some(Some("Renamed".to_string())),
                    ..ConnectionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.label.as_deref(), Some("Renamed"));
        assert_eq!(renamed.password.as_deref(), Some("supersecret"));

        let cleared = storage
            .update_connection(
                id,
                &ConnectionUpdate {
                    password: Some(None),
                    ..ConnectionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.password, None);
    }

    #[test]
    fn rejects_over_long_fields() {
        let mut storage = storage();
        let mut new = new_connection();
        new.label = Some("x".repeat(MAX_FIELD_LEN + 1));
        let err = storage.create_connection(&new).unwrap_err();
        assert!(matches!(err, PokerError::Validation { ref field, .. } if field == "label"));
    }

    #[test]
    fn missing_rows_report_not_found() {
        let mut storage = storage();
        assert!(matches!(
            storage.delete_connection(9),
            Err(PokerError::ConnectionNotFound { id: 9 })
        ));
        assert!(matches!(
            storage.require_session(4),
            Err(PokerError::SessionNotFound { id: 4 })
        ));
        assert!(matches!(
            storage.set_story_points(2, Some(3.0)),
            Err(PokerError::StoryNotFound { id: 2 })
        ));
    }

    #[test]
    fn max_position_per_session() {
        let mut storage = storage();
        let session = storage.create_session("Sprint 1", None).unwrap();
        assert_eq!(storage.max_story_position(Some(session.id)).unwrap(), None);
        assert_eq!(storage.max_story_position(None).unwrap(), None);

        storage
            .insert_stories(&[
                new_story("A-1", 0, Some(session.id)),
                new_story("A-2", 4, Some(session.id)),
                new_story("B-1", 9, None),
            ])
            .unwrap();
        assert_eq!(storage.max_story_position(Some(session.id)).unwrap(), Some(4));
    }

    #[test]
    fn deleting_session_detaches_stories() {
        let mut storage = storage();
        let session = storage
            .create_session("Sprint 2", NaiveDate::from_ymd_opt(2024, 5, 1))
            .unwrap();
        let stories = storage
            .insert_stories(&[new_story("A-1", 0, Some(session.id))])
            .unwrap();

        storage.delete_session(session.id).unwrap();
        let story = storage.require_story(stories[0].id).unwrap();
        assert_eq!(story.poker_session_id, None);
    }

    #[test]
    fn stories_by_ids_keeps_order() {
        let mut storage = storage();
        let stories = storage
            .insert_stories(&[new_story("A-1", 0, None), new_story("A-2", 1, None)])
            .unwrap();
        let loaded = storage
            .stories_by_ids(&[stories[1].id, stories[0].id])
            .unwrap();
        assert_eq!(loaded[0].ticket_number, "A-2");
        assert_eq!(loaded[1].ticket_number, "A-1");
    }

    #[test]
    fn session_date_round_trips() {
        let mut storage = storage();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29);
        let id = storage.create_session("Leap", date).unwrap().id;
        assert_eq!(storage.require_session(id).unwrap().poker_date, date);
    }

    #[test]
    fn story_points_reject_nan() {
        let mut storage = storage();
        let id = storage.insert_stories(&[new_story("A-1", 0, None)]).unwrap()[0].id;
        assert!(storage.set_story_points(id, Some(f64::NAN)).is_err());
        let story = storage.set_story_points(id, Some(2.5)).unwrap();
        assert_eq!(story.story_points, Some(2.5));
    }
}
