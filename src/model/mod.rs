//! Core data types for `poker_jira`.
//!
//! - `ConnectionRecord` - A stored Jira connection
//! - `PokerSession` - A group of stories estimated together
//! - `Story` - A local mirror of one Jira issue

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored Jira connection.
///
/// `password` holds the decrypted value; storage encrypts it on the way in
/// and decrypts it on the way out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    pub story_points_field: String,
}

impl ConnectionRecord {
    /// Name shown to users: the label when set, otherwise the API URL.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.api_url)
    }

    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Apply an update without persisting it.
    #[must_use]
    pub fn with_update(&self, update: &ConnectionUpdate) -> Self {
        let mut next = self.clone();
        if let Some(label) = &update.label {
            next.label.clone_from(label);
        }
        if let Some(api_url) = &update.api_url {
            next.api_url.clone_from(api_url);
        }
        if let Some(username) = &update.username {
            next.username.clone_from(username);
        }
        if let Some(password) = &update.password {
            next.password.clone_from(password);
        }
        if let Some(field) = &update.story_points_field {
            next.story_points_field.clone_from(field);
        }
        next
    }
}

impl fmt::Display for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("story_points_field", &self.story_points_field)
            .finish()
    }
}

/// Fields for a connection that has not been stored yet.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NewConnection {
    pub label: Option<String>,
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub story_points_field: String,
}

impl NewConnection {
    /// View as a record (with a placeholder ID) so it can be resolved and
    /// verified before it is saved.
    #[must_use]
    pub fn preview(&self) -> ConnectionRecord {
        ConnectionRecord {
            id: 0,
            label: self.label.clone(),
            api_url: self.api_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            story_points_field: self.story_points_field.clone(),
        }
    }
}

impl fmt::Debug for NewConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewConnection")
            .field("label", &self.label)
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("story_points_field", &self.story_points_field)
            .finish()
    }
}

/// Partial update of a stored connection.
///
/// The outer `Option` means "leave unchanged"; `Some(None)` clears the field.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub label: Option<Option<String>>,
    pub api_url: Option<String>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub story_points_field: Option<String>,
}

impl ConnectionUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.api_url.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.story_points_field.is_none()
    }
}

impl fmt::Debug for ConnectionUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionUpdate")
            .field("label", &self.label)
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field(
                "password",
                &self
                    .password
                    .as_ref()
                    .map(|p| p.as_ref().map(|_| "<redacted>")),
            )
            .field("story_points_field", &self.story_points_field)
            .finish()
    }
}

/// A poker session that stories are estimated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokerSession {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poker_date: Option<NaiveDate>,
}

impl fmt::Display for PokerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A story mirrored from one Jira issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub ticket_number: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_points: Option<f64>,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poker_session_id: Option<i64>,
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.ticket_number, self.title)
    }
}

/// A story about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStory {
    pub ticket_number: String,
    pub title: String,
    pub description: String,
    pub position: i64,
    pub poker_session_id: Option<i64>,
}
