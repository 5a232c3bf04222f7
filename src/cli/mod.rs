//! CLI definitions and entry point.

use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Jira connector for planning poker sessions (`SQLite` + Jira REST)
#[derive(Parser, Debug)]
#[command(name = "ppj", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: .poker/poker.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// `SQLite` busy timeout in ms
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only log errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a poker workspace in the current directory
    Init {
        /// Recreate the database even if it exists
        #[arg(long)]
        force: bool,
    },

    /// Manage Jira connections
    Connection {
        #[command(subcommand)]
        command: ConnectionCommands,
    },

    /// Manage poker sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Manage stories
    Story {
        #[command(subcommand)]
        command: StoryCommands,
    },

    /// Import Jira issues matching a JQL query as stories
    Import(ImportArgs),

    /// Export story points to Jira
    Export(ExportArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Credentials typed for a single request. They are never stored.
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// API username (default: the stored one)
    #[arg(long)]
    pub username: Option<String>,

    /// API password (default: the stored one)
    #[arg(long, env = "PPJ_JIRA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConnectionCommands {
    /// Store a new connection
    Add(ConnectionAddArgs),
    /// Change a stored connection
    Edit(ConnectionEditArgs),
    /// List connections
    List,
    /// Show one connection
    Show {
        /// Connection ID
        id: i64,
    },
    /// Delete a connection
    Delete {
        /// Connection ID
        id: i64,
    },
    /// Check that a connection can authenticate
    Test(ConnectionTestArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionAddArgs {
    /// Display name
    #[arg(long)]
    pub label: Option<String>,

    /// Base URL of the Jira instance
    #[arg(long)]
    pub api_url: String,

    /// API username
    #[arg(long)]
    pub username: Option<String>,

    /// API password (stored encrypted)
    #[arg(long)]
    pub password: Option<String>,

    /// Jira field that holds story points (e.g. customfield_10002)
    #[arg(long)]
    pub story_points_field: String,

    /// Verify the connection before saving
    #[arg(long)]
    pub test: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionEditArgs {
    /// Connection ID
    pub id: i64,

    /// Display name (empty clears it)
    #[arg(long)]
    pub label: Option<String>,

    /// Base URL of the Jira instance
    #[arg(long)]
    pub api_url: Option<String>,

    /// API username (empty clears it)
    #[arg(long)]
    pub username: Option<String>,

    /// New API password (omit to keep the stored one)
    #[arg(long)]
    pub password: Option<String>,

    /// Remove the stored password
    #[arg(long)]
    pub delete_password: bool,

    /// Jira field that holds story points
    #[arg(long)]
    pub story_points_field: Option<String>,

    /// Verify the edited connection before saving
    #[arg(long)]
    pub test: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionTestArgs {
    /// Connection ID
    pub id: i64,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// API URL to try instead of the stored one
    #[arg(long)]
    pub api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Create a poker session
    Create {
        /// Session name
        name: String,
        /// Poker date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List poker sessions
    List,
    /// Delete a poker session (its stories are kept)
    Delete {
        /// Session ID
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum StoryCommands {
    /// List stories
    List {
        /// Only stories of this session
        #[arg(long)]
        session: Option<i64>,
    },
    /// Set story points (empty value clears them)
    Points {
        /// Story ID
        id: i64,
        /// Points, e.g. 3 or 0.5
        value: String,
    },
    /// Delete a story
    Delete {
        /// Story ID
        id: i64,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Connection ID
    pub connection: i64,

    /// JQL query selecting the issues
    #[arg(long)]
    pub jql: String,

    /// Poker session to add the stories to
    #[arg(long)]
    pub session: Option<i64>,

    /// Import at most this many issues (default: import.max-results)
    #[arg(long)]
    pub max_results: Option<usize>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args, Debug, Clone, Default)]
#[command(group(ArgGroup::new("selection").required(true).args(["stories", "session"])))]
pub struct ExportArgs {
    /// Connection ID
    pub connection: i64,

    /// Story IDs to export
    #[arg(long = "story", num_args = 1..)]
    pub stories: Vec<i64>,

    /// Export every story of this session
    #[arg(long)]
    pub session: Option<i64>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the merged configuration (secrets masked)
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_requires_a_selection() {
        assert!(Cli::try_parse_from(["ppj", "export", "1"]).is_err());
        assert!(Cli::try_parse_from(["ppj", "export", "1", "--story", "1", "--session", "2"]).is_err());
        let cli = Cli::try_parse_from(["ppj", "export", "1", "--story", "4", "5"]).unwrap();
        match cli.command {
            Commands::Export(args) => assert_eq!(args.stories, vec![4, 5]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn session_date_parses() {
        let cli =
            Cli::try_parse_from(["ppj", "session", "create", "Sprint", "--date", "2024-05-01"])
                .unwrap();
        match cli.command {
            Commands::Session {
                command: SessionCommands::Create { date, .. },
            } => assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
