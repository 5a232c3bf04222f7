use crate::cli::StoryCommands;
use crate::cli::commands::{open_workspace, print_json};
use crate::config::CliOverrides;
use crate::error::{PokerError, Result};
use crate::model::Story;
use serde_json::json;

/// Execute the story command.
///
/// # Errors
///
/// Returns an error if database operations fail or the input is invalid.
pub fn execute(command: &StoryCommands, json: bool, cli: &CliOverrides) -> Result<()> {
    let (mut storage, _) = open_workspace(cli)?;

    match command {
        StoryCommands::List { session } => {
            if let Some(id) = session {
                storage.require_session(*id)?;
            }
            let stories = storage.list_stories(*session)?;
            if json {
                return print_json(&stories);
            }
            if stories.is_empty() {
                println!("No stories.");
            }
            for story in &stories {
                print_story_line(story);
            }
        }
        StoryCommands::Points { id, value } => {
            let points = parse_points(value)?;
            let story = storage.set_story_points(*id, points)?;
            if json {
                print_json(&story)?;
            } else {
                match story.story_points {
                    Some(points) => println!("Set story points of \"{story}\" to {points}"),
                    None => println!("Cleared story points of \"{story}\""),
                }
            }
        }
        StoryCommands::Delete { id } => {
            storage.delete_story(*id)?;
            if json {
                print_json(&json!({ "status": "deleted", "id": id }))?;
            } else {
                println!("Deleted story {id}");
            }
        }
    }
    Ok(())
}

fn print_story_line(story: &Story) {
    let session = story
        .poker_session_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let points = story
        .story_points
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    println!(
        "{:>4}  session {session:<4} #{:<3} {story}  [{points}]",
        story.id, story.position
    );
}

/// Parse a points argument; an empty value clears the points.
pub(crate) fn parse_points(value: &str) -> Result<Option<f64>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .map(Some)
        .ok_or_else(|| PokerError::validation("story_points", "must be a number"))
}
