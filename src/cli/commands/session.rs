use crate::cli::SessionCommands;
use crate::cli::commands::{open_workspace, print_json};
use crate::config::CliOverrides;
use crate::error::Result;
use serde_json::json;

/// Execute the session command.
///
/// # Errors
///
/// Returns an error if database operations fail or the session does not exist.
pub fn execute(command: &SessionCommands, json: bool, cli: &CliOverrides) -> Result<()> {
    let (mut storage, _) = open_workspace(cli)?;

    match command {
        SessionCommands::Create { name, date } => {
            let session = storage.create_session(name, *date)?;
            if json {
                print_json(&session)?;
            } else {
                println!("Created poker session {}: {session}", session.id);
            }
        }
        SessionCommands::List => {
            let sessions = storage.list_sessions()?;
            if json {
                return print_json(&sessions);
            }
            if sessions.is_empty() {
                println!("No poker sessions.");
            }
            for session in &sessions {
                let date = session
                    .poker_date
                    .map_or_else(|| "-".to_string(), |d| d.to_string());
                println!("{:>4}  {date:<10}  {session}", session.id);
            }
        }
        SessionCommands::Delete { id } => {
            storage.delete_session(*id)?;
            if json {
                print_json(&json!({ "status": "deleted", "id": id }))?;
            } else {
                println!("Deleted poker session {id}");
            }
        }
    }
    Ok(())
}
