//! One module per `ppj` command.

pub mod config;
pub mod connection;
pub mod export;
pub mod import;
pub mod init;
pub mod session;
pub mod story;

use crate::cli::CredentialArgs;
use crate::config::{self as app_config, CliOverrides, Workspace};
use crate::error::Result;
use crate::resolver::Overrides;
use crate::storage::SqliteStorage;
use serde::Serialize;

/// Find the workspace from the CWD and open its database.
pub(crate) fn open_workspace(cli: &CliOverrides) -> Result<(SqliteStorage, Workspace)> {
    let poker_dir = app_config::discover_poker_dir(None)?;
    app_config::open_storage(&poker_dir, cli)
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl CredentialArgs {
    /// Overrides for a request whose API URL must come from the stored record.
    #[must_use]
    pub fn to_overrides(&self) -> Overrides {
        Overrides {
            username: self.username.clone(),
            password: self.password.clone(),
            api_url: None,
        }
    }
}
