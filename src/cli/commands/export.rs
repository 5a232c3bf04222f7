use crate::cli::ExportArgs;
use crate::cli::commands::{open_workspace, print_json};
use crate::config::CliOverrides;
use crate::error::{PokerError, Result};
use crate::exporter::export_story_points;
use crate::resolver::ConnectionResolver;
use crate::tracker::JiraClientFactory;

/// Execute the export command.
///
/// Per-story results are printed before the command fails, so a partial
/// export still reports what was written.
///
/// # Errors
///
/// Returns an error if a lookup fails, the connection cannot authenticate,
/// or any story was not exported.
pub fn execute(args: &ExportArgs, json: bool, cli: &CliOverrides) -> Result<()> {
    let (storage, workspace) = open_workspace(cli)?;
    let record = storage.require_connection(args.connection)?;
    let stories = match args.session {
        Some(id) => {
            storage.require_session(id)?;
            storage.list_stories(Some(id))?
        }
        None => storage.stories_by_ids(&args.stories)?,
    };

    if stories.is_empty() {
        if json {
            print_json(&serde_json::json!({ "exported": 0, "failures": [], "skipped": [] }))?;
        } else {
            println!("No stories to export.");
        }
        return Ok(());
    }

    let factory = JiraClientFactory::new(workspace.tracker);
    let resolver = ConnectionResolver::new(&factory, &record, &args.credentials.to_overrides());
    let client = resolver.verify()?;

    let outcome = export_story_points(
        client,
        &record.story_points_field,
        &stories,
        &resolver.connection().failure_context(),
    );

    if json {
        print_json(&outcome)?;
    } else {
        if let Some(message) = outcome.success_message() {
            println!("{message}");
        }
        for message in outcome
            .failure_messages()
            .into_iter()
            .chain(outcome.skipped_messages())
        {
            eprintln!("{message}");
        }
    }

    if outcome.is_complete() {
        Ok(())
    } else {
        Err(PokerError::ExportIncomplete {
            failed: outcome.failures.len() + outcome.skipped.len(),
            total: outcome.total(),
        })
    }
}
