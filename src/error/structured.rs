//! Structured error output.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

use crate::error::PokerError;
use crate::tracker::DiagnosticKind;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Database Errors (exit code 2) ===
    /// Database operation failed
    DatabaseError,
    /// Workspace not initialized
    NotInitialized,
    /// Already initialized
    AlreadyInitialized,

    // === Lookup Errors (exit code 3) ===
    /// Jira connection not found
    ConnectionNotFound,
    /// Poker session not found
    SessionNotFound,
    /// Story not found
    StoryNotFound,

    // === Validation Errors (exit code 4) ===
    /// Field validation failed
    ValidationFailed,

    // === Tracker Errors (exit code 5) ===
    /// API URL or username missing
    MissingCredentials,
    /// Tracker rejected the credentials (401)
    AuthenticationFailed,
    /// Tracker returned 404
    TrackerNotFound,
    /// Tracker returned 400
    BadRequest,
    /// Tracker returned another non-success status
    TrackerStatus,
    /// Tracker could not be reached
    ConnectionFailure,
    /// Request failed for another transport reason
    AmbiguousRequest,
    /// Unclassified tracker failure
    TrackerUnknown,
    /// Some stories were not exported
    ExportIncomplete,

    // === Config Errors (exit code 7) ===
    /// Configuration error
    ConfigError,
    /// Stored secret could not be encrypted or decrypted
    SecretError,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::ConnectionNotFound => "CONNECTION_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::StoryNotFound => "STORY_NOT_FOUND",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::TrackerNotFound => "TRACKER_NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::TrackerStatus => "TRACKER_STATUS",
            Self::ConnectionFailure => "CONNECTION_FAILURE",
            Self::AmbiguousRequest => "AMBIGUOUS_REQUEST",
            Self::TrackerUnknown => "TRACKER_UNKNOWN",
            Self::ExportIncomplete => "EXPORT_INCOMPLETE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::SecretError => "SECRET_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same command could succeed.
    ///
    /// Transport failures may be transient; everything else needs a change of
    /// input first.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure | Self::AmbiguousRequest | Self::ExportIncomplete
        )
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Database errors
    /// - 3: Lookup errors
    /// - 4: Validation errors
    /// - 5: Tracker errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::DatabaseError | Self::NotInitialized | Self::AlreadyInitialized => 2,
            Self::ConnectionNotFound | Self::SessionNotFound | Self::StoryNotFound => 3,
            Self::ValidationFailed => 4,
            Self::MissingCredentials
            | Self::AuthenticationFailed
            | Self::TrackerNotFound
            | Self::BadRequest
            | Self::TrackerStatus
            | Self::ConnectionFailure
            | Self::AmbiguousRequest
            | Self::TrackerUnknown
            | Self::ExportIncomplete => 5,
            Self::ConfigError | Self::SecretError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }

    const fn from_diagnostic_kind(kind: DiagnosticKind) -> Self {
        match kind {
            DiagnosticKind::MissingCredentials => Self::MissingCredentials,
            DiagnosticKind::AuthenticationFailed => Self::AuthenticationFailed,
            DiagnosticKind::NotFound => Self::TrackerNotFound,
            DiagnosticKind::BadRequest => Self::BadRequest,
            DiagnosticKind::OtherStatus(_) => Self::TrackerStatus,
            DiagnosticKind::ConnectionFailure => Self::ConnectionFailure,
            DiagnosticKind::AmbiguousRequestError => Self::AmbiguousRequest,
            DiagnosticKind::Unknown => Self::TrackerUnknown,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `PokerError`.
    #[must_use]
    pub fn from_error(err: &PokerError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = Self::generate_hint(err);

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable: code.is_retryable(),
            context,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &PokerError) -> (ErrorCode, Option<Value>) {
        match err {
            PokerError::Database(_) => (ErrorCode::DatabaseError, None),
            PokerError::NotInitialized => (ErrorCode::NotInitialized, None),
            PokerError::AlreadyInitialized { path } => (
                ErrorCode::AlreadyInitialized,
                Some(json!({"path": path.display().to_string()})),
            ),
            PokerError::ConnectionNotFound { id } => {
                (ErrorCode::ConnectionNotFound, Some(json!({"id": id})))
            }
            PokerError::SessionNotFound { id } => {
                (ErrorCode::SessionNotFound, Some(json!({"id": id})))
            }
            PokerError::StoryNotFound { id } => (ErrorCode::StoryNotFound, Some(json!({"id": id}))),
            PokerError::Validation { field, reason } => (
                ErrorCode::ValidationFailed,
                Some(json!({"field": field, "reason": reason})),
            ),
            PokerError::Tracker(diagnostic) => (
                ErrorCode::from_diagnostic_kind(diagnostic.kind),
                Some(json!({"kind": diagnostic.kind.as_str()})),
            ),
            PokerError::ExportIncomplete { failed, total } => (
                ErrorCode::ExportIncomplete,
                Some(json!({"failed": failed, "total": total})),
            ),
            PokerError::Secret(_) => (ErrorCode::SecretError, None),
            PokerError::Config(_) => (ErrorCode::ConfigError, None),
            PokerError::Io(_) => (ErrorCode::IoError, None),
            PokerError::Json(_) => (ErrorCode::JsonError, None),
            PokerError::Yaml(_) => (ErrorCode::YamlError, None),
            PokerError::Other(_) => (ErrorCode::InternalError, None),
        }
    }

    fn generate_hint(err: &PokerError) -> Option<String> {
        if let Some(suggestion) = err.suggestion() {
            return Some(suggestion.to_string());
        }

        match err {
            PokerError::Tracker(diagnostic) => match diagnostic.kind {
                DiagnosticKind::MissingCredentials | DiagnosticKind::AuthenticationFailed => Some(
                    "Pass --username/--password or update the connection with 'ppj connection edit'"
                        .to_string(),
                ),
                DiagnosticKind::ConnectionFailure => Some(
                    "Raise tracker.connect-timeout or tracker.max-retries if the server is slow"
                        .to_string(),
                ),
                _ => None,
            },
            _ => None,
        }
    }
}
