//! Translation of tracker failures into user-facing messages.

use super::TrackerError;
use serde::Serialize;
use std::fmt;

pub const MISSING_CREDENTIALS: &str =
    "Missing credentials. Check whether you entered an API URL, and a username.";
pub const AUTHENTICATION_FAILED: &str = "Could not authenticate the API user with the given credentials. Make sure that you entered the correct data.";
pub const NOT_FOUND_IN_SELECTED_BACKEND: &str =
    "The story does probably not exist inside the selected backend.";
pub const CONNECTION_FAILURE: &str = "Failed to connect to server.";
pub const AMBIGUOUS_REQUEST_ERROR: &str =
    "There was an ambiguous error with your request. Check if all your data is correct.";
pub const UNKNOWN_EXCEPTION: &str = "Encountered an unknown exception.";

/// Category of a tracker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// API URL or username empty; the network was never reached.
    MissingCredentials,
    /// 401
    AuthenticationFailed,
    /// 404
    NotFound,
    /// 400; the message is the tracker's own text.
    BadRequest,
    OtherStatus(u16),
    ConnectionFailure,
    AmbiguousRequestError,
    Unknown,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::AuthenticationFailed => "authentication_failed",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::OtherStatus(_) => "other_status",
            Self::ConnectionFailure => "connection_failure",
            Self::AmbiguousRequestError => "ambiguous_request_error",
            Self::Unknown => "unknown",
        }
    }
}

/// A classified failure with the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing_credentials() -> Self {
        Self::new(DiagnosticKind::MissingCredentials, MISSING_CREDENTIALS)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// What was known when the failure happened.
///
/// Empty strings count as unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    pub api_url: Option<String>,
    /// Display name of the connection.
    pub connection: Option<String>,
}

impl FailureContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref().filter(|url| !url.is_empty())
    }

    fn connection(&self) -> Option<&str> {
        self.connection.as_deref().filter(|name| !name.is_empty())
    }
}

/// Map a tracker failure to a stable, user-facing diagnostic.
#[must_use]
pub fn explain_failure(error: &TrackerError, context: &FailureContext) -> Diagnostic {
    match error {
        TrackerError::Status { status, text } => explain_status(*status, text, context),
        TrackerError::Connection(_) => {
            let message = context.api_url().map_or_else(
                || CONNECTION_FAILURE.to_string(),
                |url| format!("{CONNECTION_FAILURE} Is \"{url}\" the correct API URL?"),
            );
            Diagnostic::new(DiagnosticKind::ConnectionFailure, message)
        }
        TrackerError::Request(_) => Diagnostic::new(
            DiagnosticKind::AmbiguousRequestError,
            AMBIGUOUS_REQUEST_ERROR,
        ),
        TrackerError::Other(_) => Diagnostic::new(DiagnosticKind::Unknown, UNKNOWN_EXCEPTION),
    }
}

fn explain_status(status: u16, text: &str, context: &FailureContext) -> Diagnostic {
    match status {
        // Jira explains malformed queries itself; its text is safe to show.
        400 => Diagnostic::new(DiagnosticKind::BadRequest, text),
        401 => Diagnostic::new(DiagnosticKind::AuthenticationFailed, AUTHENTICATION_FAILED),
        404 => {
            let message = context.connection().map_or_else(
                || NOT_FOUND_IN_SELECTED_BACKEND.to_string(),
                |name| format!("The story does probably not exist inside \"{name}\"."),
            );
            Diagnostic::new(DiagnosticKind::NotFound, message)
        }
        other => Diagnostic::new(
            DiagnosticKind::OtherStatus(other),
            format!("Received status code {other}."),
        ),
    }
}
