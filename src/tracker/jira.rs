//! Jira REST v2 adapter over `reqwest::blocking`.
//!
//! Only the endpoints the importer and exporter need are covered:
//! `myself` for authentication, `search`, and `issue/{key}` (GET and PUT).

use super::{ClientFactory, IssueQuery, RemoteIssue, TrackerClient, TrackerError};
use crate::config::TrackerSettings;
use crate::resolver::EffectiveConnection;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;
use tracing::{debug, trace};

const API_PREFIX: [&str; 3] = ["rest", "api", "2"];

/// Builds [`JiraClient`]s with fixed timeouts and retry count.
#[derive(Debug, Clone)]
pub struct JiraClientFactory {
    settings: TrackerSettings,
}

impl JiraClientFactory {
    #[must_use]
    pub const fn new(settings: TrackerSettings) -> Self {
        Self { settings }
    }
}

impl ClientFactory for JiraClientFactory {
    type Client = JiraClient;

    fn authenticate(&self, connection: &EffectiveConnection) -> Result<JiraClient, TrackerError> {
        let http = Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.read_timeout)
            .build()
            .map_err(|e| TrackerError::Request(e.to_string()))?;

        let base_url = Url::parse(connection.api_url.trim())
            .map_err(|e| TrackerError::Request(format!("invalid API URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::Request(format!(
                "invalid API URL: {}",
                connection.api_url
            )));
        }

        let client = JiraClient {
            http,
            base_url,
            username: connection.username.clone(),
            password: connection.password.clone(),
            max_retries: self.settings.max_retries,
            page_size: self.settings.page_size.max(1),
        };

        debug!(api_url = %client.base_url, "Authenticating against Jira");
        let _: Value = client.get_json(&["myself"], &[])?;
        Ok(client)
    }
}

/// An authenticated Jira client.
pub struct JiraClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    max_retries: u32,
    page_size: usize,
}

impl fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// API URL for `segments`; each segment is percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.username, Some(&self.password))
    }

    /// Send a request, retrying connection failures up to `max_retries` times.
    fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, TrackerError> {
        let response = with_retries(self.max_retries, || {
            build().send().map_err(|e| map_transport_error(&e))
        })?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, TrackerError> {
        let url = self.url(segments);
        trace!(%url, "GET");
        let response = self.send(|| self.authed(self.http.get(url.clone()).query(query)))?;
        let body = response.text().map_err(|e| map_transport_error(&e))?;
        serde_json::from_str(&body).map_err(|e| TrackerError::Other(e.to_string()))
    }
}

impl TrackerClient for JiraClient {
    fn search_issues(&self, query: &IssueQuery) -> Result<Vec<RemoteIssue>, TrackerError> {
        let mut issues = Vec::new();
        loop {
            let wanted = query
                .max_results
                .map_or(self.page_size, |cap| {
                    cap.saturating_sub(issues.len()).min(self.page_size)
                });
            if wanted == 0 {
                break;
            }

            let params = [
                ("jql", query.jql.clone()),
                ("startAt", issues.len().to_string()),
                ("maxResults", wanted.to_string()),
                ("fields", query.fields.join(",")),
                ("expand", query.expand.join(",")),
            ];
            let page: SearchPage = self.get_json(&["search"], &params)?;
            let received = page.issues.len();
            debug!(start_at = issues.len(), received, total = page.total, "Fetched search page");
            issues.extend(page.issues.into_iter().map(RemoteIssue::from));

            if received == 0 || issues.len() >= page.total {
                break;
            }
        }
        Ok(issues)
    }

    fn issue(&self, key: &str) -> Result<RemoteIssue, TrackerError> {
        let payload: IssuePayload =
            self.get_json(&["issue", key], &[("fields", "summary".to_string())])?;
        Ok(payload.into())
    }

    fn update_issue(&self, key: &str, fields: &Map<String, Value>) -> Result<(), TrackerError> {
        let url = self.url(&["issue", key]);
        let body = json!({ "fields": fields });
        trace!(%url, "PUT");
        self.send(|| self.authed(self.http.put(url.clone()).json(&body)))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<IssuePayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    key: String,
    #[serde(default)]
    fields: IssueFields,
    #[serde(rename = "renderedFields", default)]
    rendered_fields: Option<IssueFields>,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<IssuePayload> for RemoteIssue {
    fn from(payload: IssuePayload) -> Self {
        Self {
            key: payload.key,
            summary: payload.fields.summary.unwrap_or_default(),
            description: payload.fields.description,
            rendered_description: payload.rendered_fields.and_then(|r| r.description),
        }
    }
}

fn check_status(response: Response) -> Result<Response, TrackerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(TrackerError::Status {
        status: status.as_u16(),
        text: extract_error_text(&body),
    })
}

/// Run `attempt`, retrying `Connection` failures up to `max_retries` extra
/// times. Any other outcome is returned as is.
fn with_retries<T>(
    max_retries: u32,
    mut attempt: impl FnMut() -> Result<T, TrackerError>,
) -> Result<T, TrackerError> {
    let mut retries = 0;
    loop {
        match attempt() {
            Err(TrackerError::Connection(reason)) if retries < max_retries => {
                retries += 1;
                debug!(retries, %reason, "Retrying Jira request");
            }
            outcome => return outcome,
        }
    }
}

/// Classify a reqwest failure. Connect timeouts count as connection errors.
fn map_transport_error(err: &reqwest::Error) -> TrackerError {
    if err.is_connect() {
        TrackerError::Connection(err.to_string())
    } else {
        TrackerError::Request(err.to_string())
    }
}

/// Pull the human-readable message out of a Jira error body.
///
/// Tries `message`, then the first `errorMessages` entry, then the values of
/// `errors`, and falls back to the raw body.
pub(crate) fn extract_error_text(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(first) = value
        .get("errorMessages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.iter().find_map(Value::as_str))
    {
        return first.to_string();
    }
    if let Some(errors) = value.get("errors").and_then(Value::as_object) {
        let joined = errors
            .values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if !joined.is_empty() {
            return joined;
        }
    }
    body.to_string()
}
