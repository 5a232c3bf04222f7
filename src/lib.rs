//! Jira connector for planning poker sessions.
//!
//! Stores Jira connections (with passwords encrypted at rest), verifies them,
//! imports Jira issues as poker stories and exports story points back to Jira.
//!
//! The library is split the same way the `ppj` binary uses it:
//! - [`resolver`] turns a stored connection plus per-request overrides into an
//!   effective connection and verifies it against the tracker
//! - [`importer`] and [`exporter`] run the two tracker workflows
//! - [`tracker`] holds the client traits, the Jira adapter and error mapping
//! - [`storage`] persists connections, poker sessions and stories in `SQLite`

pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod importer;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod secret;
pub mod storage;
pub mod tracker;

pub use error::{ErrorCode, PokerError, Result, StructuredError};
