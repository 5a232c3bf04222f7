use clap::Parser;
use poker_jira::cli::commands;
use poker_jira::cli::{Cli, Commands};
use poker_jira::config;
use poker_jira::logging::init_logging;
use poker_jira::{PokerError, StructuredError};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

fn main() {
    let cli = Cli::parse();

    let log_file = std::env::var_os("PPJ_LOG_FILE").map(PathBuf::from);
    if let Err(e) = init_logging(cli.verbose, cli.quiet, log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);

    let result = match &cli.command {
        Commands::Init { force } => commands::init::execute(*force, None),
        Commands::Connection { command } => {
            commands::connection::execute(command, cli.json, &overrides)
        }
        Commands::Session { command } => commands::session::execute(command, cli.json, &overrides),
        Commands::Story { command } => commands::story::execute(command, cli.json, &overrides),
        Commands::Import(args) => commands::import::execute(args, cli.json, &overrides),
        Commands::Export(args) => commands::export::execute(args, cli.json, &overrides),
        Commands::Config { command } => commands::config::execute(command, cli.json, &overrides),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &PokerError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        db: cli.db.clone(),
        lock_timeout: cli.lock_timeout,
    }
}
