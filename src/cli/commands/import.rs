use crate::cli::ImportArgs;
use crate::cli::commands::{open_workspace, print_json};
use crate::config::CliOverrides;
use crate::error::Result;
use crate::importer::import_stories;
use crate::resolver::ConnectionResolver;
use crate::tracker::JiraClientFactory;

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if the connection or session does not exist, the
/// connection cannot authenticate, or the query fails.
pub fn execute(args: &ImportArgs, json: bool, cli: &CliOverrides) -> Result<()> {
    let (mut storage, workspace) = open_workspace(cli)?;
    let record = storage.require_connection(args.connection)?;
    if let Some(id) = args.session {
        storage.require_session(id)?;
    }

    let factory = JiraClientFactory::new(workspace.tracker);
    let resolver = ConnectionResolver::new(&factory, &record, &args.credentials.to_overrides());
    let client = resolver.verify()?;

    let max_results = args.max_results.or(workspace.tracker.max_results);
    let stories = import_stories(
        client,
        &mut storage,
        &args.jql,
        args.session,
        max_results,
        &resolver.connection().failure_context(),
    )?;

    if json {
        return print_json(&stories);
    }
    let noun = if stories.len() == 1 { "story" } else { "stories" };
    match args.session {
        Some(id) => println!("Imported {} {noun} into poker session {id}.", stories.len()),
        None => println!("Imported {} {noun}.", stories.len()),
    }
    for story in &stories {
        println!("  {story}");
    }
    Ok(())
}
