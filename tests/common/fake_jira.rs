//! Jira REST v2 stand-in for end-to-end tests, backed by `wiremock`.
//!
//! Serves `myself`, `search`, and `issue/{key}` for one set of credentials.
//! Anything else answers 401, so wrong passwords surface the way Jira reports
//! them.

use serde_json::{Value, json};
use tokio::runtime::Runtime;
use wiremock::matchers::{any, basic_auth, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ISSUE_PATH: &str = "^/rest/api/2/issue/[^/]+$";

#[derive(Debug, Clone)]
pub struct FakeIssue {
    pub key: String,
    pub summary: String,
    pub description: String,
}

impl FakeIssue {
    pub fn new(key: &str, summary: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            summary: summary.to_string(),
            description: description.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "key": self.key,
            "fields": { "summary": self.summary, "description": self.description },
            "renderedFields": { "description": format!("<p>{}</p>", self.description) },
        })
    }
}

/// Answers `search` with the page selected by `startAt` and `maxResults`.
struct SearchPages(Vec<FakeIssue>);

impl Respond for SearchPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.parse::<usize>().ok())
        };
        let start = param("startAt").unwrap_or(0);
        let max = param("maxResults").unwrap_or(50);
        let page: Vec<Value> = self.0.iter().skip(start).take(max).map(FakeIssue::to_json).collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "startAt": start,
            "maxResults": max,
            "total": self.0.len(),
            "issues": page,
        }))
    }
}

pub struct FakeJira {
    pub url: String,
    server: MockServer,
    rt: Runtime,
}

impl FakeJira {
    /// Start a server that accepts `username`/`password` and knows `issues`.
    pub fn start(username: &str, password: &str, issues: Vec<FakeIssue>) -> Self {
        let rt = Runtime::new().expect("tokio runtime");
        let server = rt.block_on(async {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path("/rest/api/2/myself"))
                .and(basic_auth(username, password))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": username })))
                .mount(&server)
                .await;

            for issue in &issues {
                Mock::given(method("GET"))
                    .and(path(format!("/rest/api/2/issue/{}", issue.key)))
                    .and(basic_auth(username, password))
                    .respond_with(ResponseTemplate::new(200).set_body_json(issue.to_json()))
                    .mount(&server)
                    .await;
            }

            Mock::given(method("GET"))
                .and(path("/rest/api/2/search"))
                .and(basic_auth(username, password))
                .respond_with(SearchPages(issues))
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path_regex(ISSUE_PATH))
                .and(basic_auth(username, password))
                .respond_with(
                    ResponseTemplate::new(404)
                        .set_body_json(json!({ "errorMessages": ["Issue Does Not Exist"] })),
                )
                .with_priority(8)
                .mount(&server)
                .await;

            Mock::given(method("PUT"))
                .and(path_regex(ISSUE_PATH))
                .and(basic_auth(username, password))
                .respond_with(ResponseTemplate::new(204))
                .mount(&server)
                .await;

            Mock::given(any())
                .respond_with(
                    ResponseTemplate::new(401)
                        .set_body_json(json!({ "errorMessages": ["Unauthorized"] })),
                )
                .with_priority(10)
                .mount(&server)
                .await;

            server
        });

        Self {
            url: server.uri(),
            server,
            rt,
        }
    }

    fn received(&self) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    /// `(issue key, PUT body)` pairs in arrival order.
    pub fn updates(&self) -> Vec<(String, Value)> {
        self.received()
            .into_iter()
            .filter(|request| request.method.as_str() == "PUT")
            .map(|request| {
                let key = request
                    .url
                    .path_segments()
                    .and_then(Iterator::last)
                    .unwrap_or_default()
                    .to_string();
                let body = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                (key, body)
            })
            .collect()
    }

    /// Request lines (`METHOD path`) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|request| format!("{} {}", request.method, request.url.path()))
            .collect()
    }
}
