//! Import of Jira issues as poker stories.

use crate::error::{PokerError, Result};
use crate::model::{NewStory, Story};
use crate::storage::SqliteStorage;
use crate::tracker::{FailureContext, IssueQuery, RemoteIssue, TrackerClient, explain_failure};
use tracing::{debug, info};

/// Run `jql` against the tracker and append every result to the session.
///
/// Stories are inserted in tracker order after all results are fetched, in a
/// single transaction. Positions continue after the session's highest one.
///
/// # Errors
///
/// Returns a validation error for an empty query, `SessionNotFound` for an
/// unknown session, and the translated tracker failure if the query fails.
/// Nothing is stored on error.
pub fn import_stories<C: TrackerClient + ?Sized>(
    client: &C,
    storage: &mut SqliteStorage,
    jql: &str,
    session_id: Option<i64>,
    max_results: Option<usize>,
    context: &FailureContext,
) -> Result<Vec<Story>> {
    let jql = jql.trim();
    if jql.is_empty() {
        return Err(PokerError::validation("jql", "cannot be empty"));
    }
    if let Some(id) = session_id {
        storage.require_session(id)?;
    }

    let query = IssueQuery {
        jql: jql.to_string(),
        fields: vec!["summary".to_string(), "description".to_string()],
        expand: vec!["renderedFields".to_string()],
        max_results,
    };
    debug!(jql, ?session_id, ?max_results, "Querying tracker");
    let issues = client
        .search_issues(&query)
        .map_err(|err| PokerError::Tracker(explain_failure(&err, context)))?;

    let start = storage
        .max_story_position(session_id)?
        .map_or(0, |max| max + 1);
    let new_stories: Vec<NewStory> = issues
        .into_iter()
        .zip(start..)
        .map(|(issue, position)| to_new_story(issue, position, session_id))
        .collect();

    let created = storage.insert_stories(&new_stories)?;
    info!(count = created.len(), ?session_id, "Imported stories");
    Ok(created)
}

fn to_new_story(issue: RemoteIssue, position: i64, session_id: Option<i64>) -> NewStory {
    NewStory {
        ticket_number: issue.key,
        title: issue.summary,
        description: issue
            .rendered_description
            .or(issue.description)
            .unwrap_or_default(),
        position,
        poker_session_id: session_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_prefers_rendered_then_raw() {
        let issue = RemoteIssue {
            key: "A-1".to_string(),
            summary: "S".to_string(),
            description: Some("raw".to_string()),
            rendered_description: Some("<p>raw</p>".to_string()),
        };
        assert_eq!(to_new_story(issue, 0, None).description, "<p>raw</p>");

        let issue = RemoteIssue {
            key: "A-2".to_string(),
            summary: "S".to_string(),
            description: Some("raw".to_string()),
            rendered_description: None,
        };
        assert_eq!(to_new_story(issue, 0, None).description, "raw");

        let issue = RemoteIssue {
            key: "A-3".to_string(),
            ..RemoteIssue::default()
        };
        assert_eq!(to_new_story(issue, 7, Some(2)).description, "");
    }
}
