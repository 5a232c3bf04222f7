//! Issue tracker collaborator.
//!
//! The rest of the crate talks to Jira only through [`ClientFactory`] and
//! [`TrackerClient`]. Failures come back as [`TrackerError`] and are turned
//! into user-facing [`Diagnostic`]s by [`explain_failure`].

mod diagnostic;
pub mod jira;

pub use diagnostic::{
    AMBIGUOUS_REQUEST_ERROR, AUTHENTICATION_FAILED, CONNECTION_FAILURE, Diagnostic,
    DiagnosticKind, FailureContext, MISSING_CREDENTIALS, NOT_FOUND_IN_SELECTED_BACKEND,
    UNKNOWN_EXCEPTION, explain_failure,
};
pub use jira::{JiraClient, JiraClientFactory};

use crate::resolver::EffectiveConnection;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure reported by a tracker client, before translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The tracker answered with a non-success status.
    ///
    /// `text` is the tracker's own error message extracted from the body.
    #[error("tracker returned status {status}: {text}")]
    Status { status: u16, text: String },

    /// The server could not be reached.
    #[error("failed to connect to tracker: {0}")]
    Connection(String),

    /// The request failed for another transport reason.
    #[error("tracker request failed: {0}")]
    Request(String),

    /// Anything else, e.g. an unreadable response body.
    #[error("{0}")]
    Other(String),
}

/// The subset of a remote issue the importer and exporter need.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteIssue {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    /// HTML rendering of `description`, when the tracker provided one.
    pub rendered_description: Option<String>,
}

/// A search in the tracker's native query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub jql: String,
    pub fields: Vec<String>,
    pub expand: Vec<String>,
    /// Upper bound on the number of issues returned. `None` fetches all.
    pub max_results: Option<usize>,
}

/// An authenticated handle on the issue tracker.
pub trait TrackerClient {
    /// Run a query and return matching issues in tracker order.
    ///
    /// # Errors
    ///
    /// Returns the tracker or transport failure of the first failing page.
    fn search_issues(&self, query: &IssueQuery) -> Result<Vec<RemoteIssue>, TrackerError>;

    /// Fetch a single issue by key.
    ///
    /// # Errors
    ///
    /// Returns `Status { status: 404, .. }` when the issue does not exist.
    fn issue(&self, key: &str) -> Result<RemoteIssue, TrackerError>;

    /// Overwrite the given fields of an issue.
    ///
    /// # Errors
    ///
    /// Returns the tracker or transport failure.
    fn update_issue(&self, key: &str, fields: &Map<String, Value>) -> Result<(), TrackerError>;
}

/// Builds authenticated clients.
///
/// Timeouts and retries are fixed when the factory is constructed.
pub trait ClientFactory {
    type Client: TrackerClient;

    /// Authenticate against the tracker.
    ///
    /// # Errors
    ///
    /// Returns the tracker or transport failure of the authentication call.
    fn authenticate(&self, connection: &EffectiveConnection) -> Result<Self::Client, TrackerError>;
}
