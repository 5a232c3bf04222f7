//! Error types and handling for `poker_jira`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Tracker failures arrive already translated into a [`Diagnostic`]
//! - Provides recovery hints for user-facing errors
//! - Provides structured JSON output via [`StructuredError`]

mod structured;

pub use structured::{ErrorCode, StructuredError};

use crate::tracker::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `poker_jira` operations.
#[derive(Error, Debug)]
pub enum PokerError {
    // === Storage Errors ===
    /// `SQLite` database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No Jira connection with this ID.
    #[error("Jira connection not found: {id}")]
    ConnectionNotFound { id: i64 },

    /// No poker session with this ID.
    #[error("Poker session not found: {id}")]
    SessionNotFound { id: i64 },

    /// No story with this ID.
    #[error("Story not found: {id}")]
    StoryNotFound { id: i64 },

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // === Tracker Errors ===
    /// A tracker call failed; the diagnostic carries the user-facing text.
    #[error("{0}")]
    Tracker(Diagnostic),

    /// Some stories could not be exported.
    #[error("{failed} of {total} stories could not be exported")]
    ExportIncomplete { failed: usize, total: usize },

    // === Secret Errors ===
    /// Encrypting or decrypting a stored secret failed.
    #[error("Secret storage error: {0}")]
    Secret(String),

    // === Configuration Errors ===
    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workspace not initialized.
    #[error("Poker workspace not initialized: run 'ppj init' first")]
    NotInitialized,

    /// Already initialized.
    #[error("Already initialized at '{path}'")]
    AlreadyInitialized { path: PathBuf },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PokerError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::ConnectionNotFound { .. }
                | Self::SessionNotFound { .. }
                | Self::StoryNotFound { .. }
                | Self::Validation { .. }
                | Self::Tracker(_)
                | Self::Config(_)
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run: ppj init"),
            Self::AlreadyInitialized { .. } => Some("Use --force to reinitialize"),
            Self::ConnectionNotFound { .. } => Some("Run 'ppj connection list' to see connections"),
            Self::SessionNotFound { .. } => Some("Run 'ppj session list' to see poker sessions"),
            Self::StoryNotFound { .. } => Some("Run 'ppj story list' to see stories"),
            Self::Secret(_) => {
                Some("Check that the key used to store the password is still in field-encryption-keys")
            }
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<Diagnostic> for PokerError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::Tracker(diagnostic)
    }
}

/// Result type using `PokerError`.
pub type Result<T> = std::result::Result<T, PokerError>;
