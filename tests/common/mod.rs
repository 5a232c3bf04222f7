#![allow(dead_code)]

use poker_jira::model::{ConnectionRecord, NewConnection, NewStory, Story};
use poker_jira::resolver::EffectiveConnection;
use poker_jira::secret::FieldCipher;
use poker_jira::storage::SqliteStorage;
use poker_jira::tracker::{ClientFactory, IssueQuery, RemoteIssue, TrackerClient, TrackerError};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Once;

pub mod cli;
pub mod fake_jira;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        poker_jira::logging::init_test_logging();
    });
}

pub fn test_cipher() -> FieldCipher {
    FieldCipher::new(["test-secret-key"]).expect("cipher")
}

pub fn test_db() -> SqliteStorage {
    init_test_logging();
    SqliteStorage::open_memory(test_cipher()).expect("Failed to create test database")
}

pub fn new_connection() -> NewConnection {
    NewConnection {
        label: Some("Team Jira".to_string()),
        api_url: "https://jira.example.com".to_string(),
        username: Some("testuser".to_string()),
        password: Some("supersecret".to_string()),
        story_points_field: "customfield_10002".to_string(),
    }
}

pub fn connection_record() -> ConnectionRecord {
    let mut record = new_connection().preview();
    record.id = 1;
    record
}

pub fn remote_issue(key: &str, summary: &str, description: &str) -> RemoteIssue {
    RemoteIssue {
        key: key.to_string(),
        summary: summary.to_string(),
        description: Some(description.to_string()),
        rendered_description: Some(format!("<p>{description}</p>")),
    }
}

/// Insert stories at positions 0.. into a session and return them.
pub fn seed_stories(
    storage: &mut SqliteStorage,
    session_id: Option<i64>,
    tickets: &[&str],
) -> Vec<Story> {
    let new: Vec<NewStory> = tickets
        .iter()
        .zip(0..)
        .map(|(ticket, position)| NewStory {
            ticket_number: (*ticket).to_string(),
            title: format!("Story {ticket}"),
            description: String::new(),
            position,
            poker_session_id: session_id,
        })
        .collect();
    storage.insert_stories(&new).expect("insert stories")
}

/// In-memory tracker that records every call.
#[derive(Debug, Clone, Default)]
pub struct MockTracker {
    pub search_result: Option<Result<Vec<RemoteIssue>, TrackerError>>,
    /// Per-key failures for `issue`.
    pub issue_errors: HashMap<String, TrackerError>,
    pub queries: RefCell<Vec<IssueQuery>>,
    pub fetched: RefCell<Vec<String>>,
    pub updates: RefCell<Vec<(String, Map<String, Value>)>>,
}

impl MockTracker {
    pub fn with_search(result: Result<Vec<RemoteIssue>, TrackerError>) -> Self {
        Self {
            search_result: Some(result),
            ..Self::default()
        }
    }

    pub fn failing_issue(mut self, key: &str, error: TrackerError) -> Self {
        self.issue_errors.insert(key.to_string(), error);
        self
    }

    pub fn updated_keys(&self) -> Vec<String> {
        self.updates.borrow().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl TrackerClient for MockTracker {
    fn search_issues(&self, query: &IssueQuery) -> Result<Vec<RemoteIssue>, TrackerError> {
        self.queries.borrow_mut().push(query.clone());
        self.search_result.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn issue(&self, key: &str) -> Result<RemoteIssue, TrackerError> {
        self.fetched.borrow_mut().push(key.to_string());
        if let Some(err) = self.issue_errors.get(key) {
            return Err(err.clone());
        }
        Ok(RemoteIssue {
            key: key.to_string(),
            ..RemoteIssue::default()
        })
    }

    fn update_issue(&self, key: &str, fields: &Map<String, Value>) -> Result<(), TrackerError> {
        self.updates
            .borrow_mut()
            .push((key.to_string(), fields.clone()));
        Ok(())
    }
}

/// Factory that counts authentications and can be told to fail.
#[derive(Debug, Default)]
pub struct MockFactory {
    pub calls: Cell<usize>,
    pub seen: RefCell<Vec<EffectiveConnection>>,
    pub fail_with: Option<TrackerError>,
}

impl MockFactory {
    pub fn failing(error: TrackerError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }
}

impl ClientFactory for MockFactory {
    type Client = MockTracker;

    fn authenticate(&self, connection: &EffectiveConnection) -> Result<MockTracker, TrackerError> {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().push(connection.clone());
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(MockTracker::default()),
        }
    }
}
