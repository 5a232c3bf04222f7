mod common;

use common::{MockTracker, init_test_logging, seed_stories, test_db};
use poker_jira::exporter::export_story_points;
use poker_jira::model::Story;
use poker_jira::tracker::{DiagnosticKind, FailureContext, TrackerError};
use serde_json::{Value, json};

fn context() -> FailureContext {
    FailureContext::new()
        .with_api_url("https://jira.example.com")
        .with_connection("Team Jira")
}

fn stories_with_points(tickets: &[&str]) -> Vec<Story> {
    let mut storage = test_db();
    let stories = seed_stories(&mut storage, None, tickets);
    stories
        .iter()
        .zip(1..)
        .map(|(story, points)| {
            storage
                .set_story_points(story.id, Some(f64::from(points)))
                .unwrap()
        })
        .collect()
}

fn not_found() -> TrackerError {
    TrackerError::Status {
        status: 404,
        text: "Issue Does Not Exist".to_string(),
    }
}

#[test]
fn every_story_is_written_to_the_points_field() {
    init_test_logging();
    let stories = stories_with_points(&["FIAE-1", "FIAE-2"]);
    let tracker = MockTracker::default();

    let outcome = export_story_points(&tracker, "customfield_10002", &stories, &context());

    assert_eq!(outcome.exported, 2);
    assert!(outcome.is_complete());
    assert_eq!(
        outcome.success_message().as_deref(),
        Some("2 stories were successfully exported.")
    );

    let updates = tracker.updates.borrow();
    assert_eq!(updates[0].0, "FIAE-1");
    assert_eq!(updates[0].1.get("customfield_10002"), Some(&json!(1.0)));
    assert_eq!(updates[1].1.get("customfield_10002"), Some(&json!(2.0)));
    assert_eq!(updates[0].1.len(), 1);
}

#[test]
fn failing_story_does_not_stop_the_rest() {
    init_test_logging();
    let stories = stories_with_points(&["FIAE-1", "GONE-2", "FIAE-3"]);
    let tracker = MockTracker::default().failing_issue("GONE-2", not_found());

    let outcome = export_story_points(&tracker, "customfield_10002", &stories, &context());

    assert_eq!(outcome.exported, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.skipped.is_empty());
    assert_eq!(tracker.updated_keys(), vec!["FIAE-1", "FIAE-3"]);

    let failure = &outcome.failures[0];
    assert_eq!(failure.story.ticket_number, "GONE-2");
    assert_eq!(failure.diagnostic.kind, DiagnosticKind::NotFound);
    assert_eq!(
        outcome.failure_messages(),
        vec![
            "\"GONE-2: Story GONE-2\" could not be exported. The story does probably not exist inside \"Team Jira\"."
                .to_string()
        ]
    );
}

#[test]
fn connection_failure_skips_remaining_stories() {
    init_test_logging();
    let stories = stories_with_points(&["FIAE-1", "FIAE-2", "FIAE-3", "FIAE-4"]);
    let tracker = MockTracker::default()
        .failing_issue("FIAE-2", TrackerError::Connection("reset".to_string()));

    let outcome = export_story_points(&tracker, "customfield_10002", &stories, &context());

    assert_eq!(outcome.exported, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(
        outcome.failures[0].diagnostic.kind,
        DiagnosticKind::ConnectionFailure
    );
    let skipped: Vec<&str> = outcome
        .skipped
        .iter()
        .map(|s| s.ticket_number.as_str())
        .collect();
    assert_eq!(skipped, vec!["FIAE-3", "FIAE-4"]);
    assert_eq!(outcome.total(), 4);
    assert_eq!(*tracker.fetched.borrow(), vec!["FIAE-1", "FIAE-2"]);
}

#[test]
fn missing_points_are_sent_as_null() {
    init_test_logging();
    let mut storage = test_db();
    let stories = seed_stories(&mut storage, None, &["FIAE-1"]);
    let tracker = MockTracker::default();

    let outcome = export_story_points(&tracker, "customfield_10002", &stories, &context());

    assert_eq!(outcome.exported, 1);
    assert_eq!(
        outcome.success_message().as_deref(),
        Some("1 story was successfully exported.")
    );
    assert_eq!(
        tracker.updates.borrow()[0].1.get("customfield_10002"),
        Some(&Value::Null)
    );
}

#[test]
fn fractional_points_are_preserved() {
    init_test_logging();
    let mut storage = test_db();
    let story = seed_stories(&mut storage, None, &["FIAE-1"]).remove(0);
    let story = storage.set_story_points(story.id, Some(0.5)).unwrap();
    let tracker = MockTracker::default();

    export_story_points(&tracker, "story_points", &[story], &context());

    assert_eq!(
        tracker.updates.borrow()[0].1.get("story_points"),
        Some(&json!(0.5))
    );
}

#[test]
fn nothing_exported_has_no_success_message() {
    init_test_logging();
    let stories = stories_with_points(&["GONE-1"]);
    let tracker = MockTracker::default().failing_issue("GONE-1", not_found());

    let outcome = export_story_points(&tracker, "customfield_10002", &stories, &context());

    assert_eq!(outcome.success_message(), None);
    assert!(!outcome.is_complete());
    assert!(tracker.updates.borrow().is_empty());
}
