//! HTTP directory client.

use super::{DirectoryClient, SearchPredicate};
use crate::config::ServerConfig;
use crate::models::{EntityId, EntityKind, EntityRecord};
use crate::{Error, Result};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::{Duration, Instant};

/// API version negotiation header sent with every request.
const ACCEPT_VERSION: &str = "version=2,application/json";

/// A decoded response, or the raw body of a 404.
#[derive(Debug)]
enum Reply {
    Found(Value),
    NotFound(String),
}

/// HTTP client configuration for the directory API.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl HttpConfig {
    /// Takes the timeouts from server settings.
    #[must_use]
    pub const fn from_server(server: &ServerConfig) -> Self {
        Self {
            timeout_ms: server.timeout_ms,
            connect_timeout_ms: server.connect_timeout_ms,
        }
    }
}

/// Builds a blocking HTTP client with the configured timeouts.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build directory HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Directory client backed by the server's REST API.
pub struct HttpDirectoryClient {
    /// Server base URL, without trailing slash.
    base_url: String,
    /// Basic auth user.
    username: Option<String>,
    /// Basic auth password.
    password: Option<SecretString>,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl HttpDirectoryClient {
    /// Creates a client for the given server.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: None,
            password: None,
            client: build_http_client(HttpConfig::default()),
        }
    }

    /// Creates a client from server settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no server URL is configured.
    pub fn from_config(server: &ServerConfig) -> Result<Self> {
        let url = server
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidInput(
                    "no server configured (use --server or CSVBRIDGE_SERVER)".to_string(),
                )
            })?;

        let mut client = Self::new(url).with_http_config(HttpConfig::from_server(server));
        if let Some(username) = &server.username {
            client = client.with_credentials(username.clone(), server.password.clone());
        }
        Ok(client)
    }

    /// Sets basic auth credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<SecretString>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a GET and decodes the JSON body.
    ///
    /// A 404 is returned undecoded as [`Reply::NotFound`].
    fn get_json(
        &self,
        operation: &'static str,
        kind: EntityKind,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Reply> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_VERSION)
            .query(query);
        if let Some(username) = &self.username {
            request = request.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            );
        }

        let start = Instant::now();
        let response = request.send().map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else if e.is_request() {
                "request"
            } else {
                "unknown"
            };
            tracing::error!(
                operation,
                kind = %kind,
                url,
                error = %e,
                error_kind,
                "Directory request failed"
            );
            Error::RemoteCall {
                operation: operation.to_string(),
                cause: format!("{error_kind} error: {e}"),
            }
        })?;

        metrics::histogram!(
            "remote_call_duration_ms",
            "operation" => operation,
            "kind" => kind.as_str()
        )
        .record(start.elapsed().as_secs_f64() * 1000.0);

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::NotFound(response.text().unwrap_or_default()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(
                operation,
                kind = %kind,
                status = %status,
                body = %body,
                "Directory API returned error status"
            );
            return Err(Error::RemoteCall {
                operation: operation.to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let value = response.json::<Value>().map_err(|e| {
            tracing::error!(operation, kind = %kind, error = %e, "Failed to parse directory response");
            Error::RemoteCall {
                operation: operation.to_string(),
                cause: e.to_string(),
            }
        })?;
        Ok(Reply::Found(value))
    }
}

impl DirectoryClient for HttpDirectoryClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn search(&self, kind: EntityKind, predicate: &SearchPredicate) -> Result<Vec<EntityRecord>> {
        let url = format!("{}/api/{}", self.base_url, kind.collection());
        let query = [("search", predicate.to_string())];
        match self.get_json("search", kind, &url, &query)? {
            Reply::Found(body) => parse_records(kind, &body),
            Reply::NotFound(body) => parse_not_found_search(kind, &url, &body),
        }
    }

    fn fetch_by_id(&self, kind: EntityKind, id: &EntityId) -> Result<EntityRecord> {
        let url = format!("{}/api/{}/{id}", self.base_url, kind.collection());
        match self.get_json("fetch_by_id", kind, &url, &[])? {
            Reply::Found(body) => parse_record(kind, &body),
            Reply::NotFound(_) => Err(Error::NotFound {
                kind,
                key: id.to_string(),
            }),
        }
    }
}

/// Decodes a search response into records.
///
/// Accepts a bare array or an object with a `results` array; each element
/// may be wrapped under the kind's record key.
///
/// # Errors
///
/// Returns an error if the body has neither shape or an element lacks
/// `id`/`name`.
pub fn parse_records(kind: EntityKind, body: &Value) -> Result<Vec<EntityRecord>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items,
            _ => return Err(decode_error(kind, "expected a 'results' array")),
        },
        _ => return Err(decode_error(kind, "expected an array or object")),
    };
    items.iter().map(|item| parse_record(kind, item)).collect()
}

/// Interprets the body of a 404 answer to a search.
///
/// Some API versions answer 404 for an empty collection. Only a body that
/// decodes as an empty collection counts as no matches.
///
/// # Errors
///
/// Returns [`Error::RemoteCall`] for any other 404 body, such as a wrong base
/// URL answered by a web server.
pub fn parse_not_found_search(kind: EntityKind, url: &str, body: &str) -> Result<Vec<EntityRecord>> {
    let empty = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| parse_records(kind, &value).ok())
        .is_some_and(|records| records.is_empty());
    if empty {
        return Ok(Vec::new());
    }

    tracing::warn!(kind = %kind, url, body = %body, "Search returned 404 without an empty collection");
    Err(Error::RemoteCall {
        operation: "search".to_string(),
        cause: format!("404 from {url}: {body}"),
    })
}

/// Decodes a single record, unwrapping `{"<record_key>": {...}}` if present.
///
/// # Errors
///
/// Returns an error if `id` or `name` is missing or has the wrong type.
pub fn parse_record(kind: EntityKind, body: &Value) -> Result<EntityRecord> {
    let record = body
        .get(kind.record_key())
        .filter(|inner| inner.is_object())
        .unwrap_or(body);

    let id = match record.get("id") {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(EntityId::Number)
            .ok_or_else(|| decode_error(kind, "'id' is not an unsigned integer"))?,
        Some(Value::String(s)) => EntityId::Text(s.clone()),
        _ => return Err(decode_error(kind, "missing 'id'")),
    };
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| decode_error(kind, "missing 'name'"))?
        .to_string();

    Ok(EntityRecord {
        id,
        name,
        major: scalar_field(record, "major"),
        minor: scalar_field(record, "minor"),
    })
}

/// Reads a string or number field as text.
fn scalar_field(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_error(kind: EntityKind, cause: &str) -> Error {
    Error::RemoteCall {
        operation: "decode_response".to_string(),
        cause: format!("{kind}: {cause}"),
    }
}
