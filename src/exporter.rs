//! Export of story points back to Jira.

use crate::model::Story;
use crate::tracker::{
    Diagnostic, DiagnosticKind, FailureContext, TrackerClient, TrackerError, explain_failure,
};
use serde::Serialize;
use serde_json::{Map, json};
use tracing::{debug, info, warn};

/// A story that could not be exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFailure {
    pub story: Story,
    pub diagnostic: Diagnostic,
}

/// Result of an export run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportOutcome {
    pub exported: usize,
    pub failures: Vec<ExportFailure>,
    /// Stories never attempted because the server became unreachable.
    pub skipped: Vec<Story>,
}

impl ExportOutcome {
    #[must_use]
    pub fn total(&self) -> usize {
        self.exported + self.failures.len() + self.skipped.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// `None` when nothing was exported.
    #[must_use]
    pub fn success_message(&self) -> Option<String> {
        match self.exported {
            0 => None,
            1 => Some("1 story was successfully exported.".to_string()),
            n => Some(format!("{n} stories were successfully exported.")),
        }
    }

    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|failure| {
                format!(
                    "\"{}\" could not be exported. {}",
                    failure.story, failure.diagnostic
                )
            })
            .collect()
    }

    #[must_use]
    pub fn skipped_messages(&self) -> Vec<String> {
        self.skipped
            .iter()
            .map(|story| {
                format!("\"{story}\" was not exported because the connection to the server failed.")
            })
            .collect()
    }
}

/// Write each story's points into `points_field` of its Jira issue.
///
/// Stories are handled one at a time. A failing story is recorded and the
/// next one is tried, except after a connection failure: then the remaining
/// stories are reported as skipped.
pub fn export_story_points<C: TrackerClient + ?Sized>(
    client: &C,
    points_field: &str,
    stories: &[Story],
    context: &FailureContext,
) -> ExportOutcome {
    let mut outcome = ExportOutcome::default();

    for (index, story) in stories.iter().enumerate() {
        match export_one(client, points_field, story) {
            Ok(()) => {
                debug!(ticket = %story.ticket_number, points = ?story.story_points, "Exported");
                outcome.exported += 1;
            }
            Err(err) => {
                let diagnostic = explain_failure(&err, context);
                warn!(ticket = %story.ticket_number, error = %err, "Export failed");
                let stop = diagnostic.kind == DiagnosticKind::ConnectionFailure;
                outcome.failures.push(ExportFailure {
                    story: story.clone(),
                    diagnostic,
                });
                if stop {
                    outcome.skipped = stories[index + 1..].to_vec();
                    break;
                }
            }
        }
    }

    info!(
        exported = outcome.exported,
        failed = outcome.failures.len(),
        skipped = outcome.skipped.len(),
        "Export finished"
    );
    outcome
}

fn export_one<C: TrackerClient + ?Sized>(
    client: &C,
    points_field: &str,
    story: &Story,
) -> Result<(), TrackerError> {
    let issue = client.issue(&story.ticket_number)?;
    let mut fields = Map::new();
    fields.insert(points_field.to_string(), json!(story.story_points));
    client.update_issue(&issue.key, &fields)
}
