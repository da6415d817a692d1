//! HTTP client for a v2-style timeline API.

use super::{PageRequest, TimelinePage, TimelineSource};
use crate::config::SourceConfig;
use crate::models::{Record, UserInfo};
use crate::{Error, Result};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Record attributes requested on every timeline page.
pub const TWEET_FIELDS: &[&str] = &[
    "id",
    "text",
    "edit_history_tweet_ids",
    "edit_controls",
    "attachments",
    "author_id",
    "context_annotations",
    "conversation_id",
    "created_at",
    "entities",
    "geo",
    "in_reply_to_user_id",
    "lang",
    "public_metrics",
    "possibly_sensitive",
    "referenced_tweets",
    "reply_settings",
    "source",
    "withheld",
];

/// Profile attributes requested on user lookup.
pub const USER_FIELDS: &[&str] = &[
    "id",
    "name",
    "username",
    "created_at",
    "description",
    "entities",
    "location",
    "protected",
    "public_metrics",
    "verified",
];

const EXPANSIONS: &str = "referenced_tweets.id";

/// Page size bounds enforced by the API.
const MIN_PAGE_SIZE: usize = 5;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: Option<UserInfo>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Record>,
    #[serde(default)]
    meta: TimelineMeta,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineMeta {
    next_token: Option<String>,
}

/// Timeline source talking to the remote API over blocking HTTP.
pub struct HttpTimelineSource {
    base_url: String,
    bearer_token: Option<SecretString>,
    page_size: usize,
    client: reqwest::blocking::Client,
}

impl HttpTimelineSource {
    /// Creates a client from source settings.
    #[must_use]
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            page_size: config.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
            client: build_http_client(config.timeout_ms, config.connect_timeout_ms),
        }
    }

    fn token(&self, operation: &str) -> Result<&str> {
        self.bearer_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or_else(|| Error::OperationFailed {
                operation: operation.to_string(),
                cause: "bearer token not configured".to_string(),
            })
    }

    fn send(
        &self,
        operation: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<(StatusCode, String)> {
        let start = Instant::now();
        let token = self.token(operation)?;
        let response = request.bearer_auth(token).send().map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else {
                "request"
            };
            tracing::error!(error = %e, error_kind, "Source request failed");
            Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("{error_kind} error: {e}"),
            }
        })?;

        let status = response.status();
        let body = response.text().map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("failed to read response body: {e}"),
        })?;

        metrics::histogram!("source_request_duration_ms", "operation" => operation)
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok((status, body))
    }
}

impl TimelineSource for HttpTimelineSource {
    #[instrument(skip(self), fields(operation = "source.get_user"))]
    fn get_user(&self, handle: &str) -> Result<UserInfo> {
        if handle.is_empty() || handle.starts_with('@') {
            return Err(Error::EntityNotFound {
                entity: handle.to_string(),
            });
        }

        let request = self
            .client
            .get(format!("{}/users/by/username/{handle}", self.base_url))
            .query(&[("user.fields", USER_FIELDS.join(","))]);
        let (status, body) = self.send("get_user", request)?;
        parse_user_response(handle, status, &body)
    }

    #[instrument(
        skip(self, request),
        fields(operation = "source.fetch_page", user_id = %request.user_id)
    )]
    fn fetch_page(&self, request: &PageRequest) -> Result<TimelinePage> {
        let mut query = vec![
            (
                "max_results",
                request.max_results.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE).to_string(),
            ),
            ("tweet.fields", TWEET_FIELDS.join(",")),
            ("expansions", EXPANSIONS.to_string()),
        ];
        if let Some(start) = &request.start_time {
            query.push(("start_time", start.as_str().to_string()));
        }
        if let Some(token) = &request.pagination_token {
            query.push(("pagination_token", token.clone()));
        }

        let http_request = self
            .client
            .get(format!("{}/users/{}/tweets", self.base_url, request.user_id))
            .query(&query);
        let (status, body) = self.send("fetch_page", http_request)?;
        if !status.is_success() {
            return Err(Error::OperationFailed {
                operation: "fetch_page".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }
        parse_timeline_response(&body)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

fn build_http_client(timeout_ms: u64, connect_timeout_ms: u64) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    if connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build source HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Interprets a user lookup response.
///
/// Lookups that the API rejects as bad requests, 404s, and bodies carrying
/// only `errors` all mean the handle does not exist.
fn parse_user_response(handle: &str, status: StatusCode, body: &str) -> Result<UserInfo> {
    let not_found = || Error::EntityNotFound {
        entity: handle.to_string(),
    };
    if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
        return Err(not_found());
    }
    if !status.is_success() {
        return Err(Error::OperationFailed {
            operation: "get_user".to_string(),
            cause: format!("API returned status: {status} - {body}"),
        });
    }

    let response: UserResponse = serde_json::from_str(body).map_err(|e| Error::OperationFailed {
        operation: "parse_user_response".to_string(),
        cause: e.to_string(),
    })?;
    match response.data {
        Some(user) => Ok(user),
        None => {
            tracing::debug!(errors = response.errors.len(), "User lookup returned no data");
            Err(not_found())
        },
    }
}

fn parse_timeline_response(body: &str) -> Result<TimelinePage> {
    let response: TimelineResponse =
        serde_json::from_str(body).map_err(|e| Error::OperationFailed {
            operation: "parse_timeline_response".to_string(),
            cause: e.to_string(),
        })?;
    Ok(TimelinePage {
        records: response.data,
        next_token: response.meta.next_token,
    })
}
