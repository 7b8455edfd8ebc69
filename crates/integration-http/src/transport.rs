use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use caseflow_core::WorkflowError;
use caseflow_domain::AttachmentUpload;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = "caseflow/integration-http";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart {
        fields: Vec<(String, String)>,
        file: AttachmentUpload,
    },
}

/// One call against the REST API, expressed relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    fn new<I, S>(method: HttpMethod, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Get, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Post, segments)
    }

    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Put, segments)
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_owned(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_file(mut self, fields: Vec<(String, String)>, file: AttachmentUpload) -> Self {
        self.body = RequestBody::Multipart { fields, file };
        self
    }

    /// Path relative to the base URL, for logs and test assertions.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Executes an [`ApiRequest`] and returns the decoded JSON body. Success responses
/// with an empty body come back as `Value::Null`.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<Value, WorkflowError>;
}

#[derive(Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub api_token: Option<String>,
}

impl fmt::Debug for HttpBackendConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpBackendConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "<redacted>"),
            )
            .field("client", &self.client)
            .finish()
    }
}

impl ReqwestTransport {
    pub fn new(config: &HttpBackendConfig) -> Result<Self, WorkflowError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(WorkflowError::validation(
                "backend base_url is empty; set [backend] base_url in the caseflow config",
            ));
        }
        Url::parse(&base_url).map_err(|error| {
            WorkflowError::validation(format!("backend base_url '{base_url}' is invalid: {error}"))
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| {
                WorkflowError::network(format!("failed to initialize caseflow HTTP client: {error}"))
            })?;

        let api_token = config
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned);

        Ok(Self {
            base_url,
            api_token,
            client,
        })
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value, WorkflowError> {
        let url = build_url(&self.base_url, &request)?;
        let path = request.path();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
        };
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart { fields, file } => {
                builder.multipart(multipart_form(fields, file)?)
            }
        };

        let response = builder.send().await.map_err(|error| {
            WorkflowError::network(format!("caseflow API request to {path} failed: {error}"))
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            WorkflowError::network(format!("failed to read caseflow API response from {path}: {error}"))
        })?;

        if !status.is_success() {
            debug!(path = %path, status = status.as_u16(), "caseflow API returned an error status");
            return Err(status_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|error| {
            WorkflowError::network(format!(
                "caseflow API response from {path} was malformed JSON: {error}"
            ))
        })
    }
}

fn multipart_form(
    fields: Vec<(String, String)>,
    file: AttachmentUpload,
) -> Result<Form, WorkflowError> {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name, value);
    }
    let part = Part::bytes(file.bytes)
        .file_name(file.file_name.clone())
        .mime_str(&file.mime_type)
        .map_err(|error| {
            WorkflowError::validation(format!(
                "attachment '{}' has an invalid mime type '{}': {error}",
                file.file_name, file.mime_type
            ))
        })?;
    Ok(form.part("file", part))
}

/// Joins `request.segments` onto `base_url`, percent-encoding each segment.
pub fn build_url(base_url: &str, request: &ApiRequest) -> Result<Url, WorkflowError> {
    let mut url = Url::parse(base_url).map_err(|error| {
        WorkflowError::validation(format!("backend base_url '{base_url}' is invalid: {error}"))
    })?;
    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            WorkflowError::validation(format!(
                "backend base_url '{base_url}' cannot carry a path"
            ))
        })?;
        segments.pop_if_empty();
        segments.extend(request.segments.iter().map(String::as_str));
    }
    if !request.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &request.query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Maps a non-success HTTP status onto the workflow error taxonomy.
pub fn status_error(status: u16, body: &str) -> WorkflowError {
    let message = format!("HTTP {status}: {}", error_detail(body));
    match status {
        401 | 403 | 409 => WorkflowError::PermissionDenied(message),
        400 | 422 => WorkflowError::ValidationFailure(message),
        _ => WorkflowError::NetworkFailure(message),
    }
}

fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_owned();
    }
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["detail", "message", "error"] {
            if let Some(Value::String(detail)) = object.get(key) {
                return truncate_for_error(detail);
            }
        }
    }
    truncate_for_error(trimmed)
}

fn truncate_for_error(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_owned()
    } else {
        format!(
            "{}...",
            body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_segments_are_joined_and_encoded() {
        let request = ApiRequest::post(["requests", "r 1/2", "claim"]);
        let url = build_url("http://127.0.0.1:8000/api/", &request).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/api/requests/r%201%2F2/claim");
    }

    #[test]
    fn query_pairs_are_appended_in_order() {
        let request = ApiRequest::get(["kanban"])
            .with_query("limit", "50")
            .with_query("filters", r#"[{"field":"topic_code"}]"#);
        let url = build_url("https://cases.example.com/api", &request).expect("url");
        assert_eq!(
            url.as_str(),
            "https://cases.example.com/api/kanban?limit=50&filters=%5B%7B%22field%22%3A%22topic_code%22%7D%5D"
        );
        assert_eq!(request.query_value("limit"), Some("50"));
        assert_eq!(request.path(), "kanban");
    }

    #[test]
    fn statuses_map_onto_the_error_taxonomy() {
        assert!(matches!(
            status_error(403, r#"{"detail":"not your request"}"#),
            WorkflowError::PermissionDenied(message) if message == "HTTP 403: not your request"
        ));
        assert!(matches!(status_error(409, ""), WorkflowError::PermissionDenied(_)));
        assert!(matches!(status_error(401, "nope"), WorkflowError::PermissionDenied(_)));
        assert!(matches!(
            status_error(422, r#"{"message":"status_code is required"}"#),
            WorkflowError::ValidationFailure(message) if message.ends_with("status_code is required")
        ));
        assert!(matches!(status_error(400, "bad"), WorkflowError::ValidationFailure(_)));
        assert!(matches!(status_error(500, "boom"), WorkflowError::NetworkFailure(_)));
        assert!(matches!(status_error(404, ""), WorkflowError::NetworkFailure(_)));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let WorkflowError::NetworkFailure(message) = status_error(502, &body) else {
            panic!("expected network failure");
        };
        assert!(message.ends_with("..."));
        assert!(message.len() < 250);
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let config = HttpBackendConfig {
            base_url: "http://127.0.0.1:8000/api".to_owned(),
            request_timeout: Duration::from_secs(5),
            api_token: Some("secret-token".to_owned()),
        };
        let transport = ReqwestTransport::new(&config).expect("transport");

        let rendered = format!("{config:?} {transport:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn blank_base_url_is_rejected() {
        let config = HttpBackendConfig {
            base_url: "  ".to_owned(),
            request_timeout: Duration::from_secs(5),
            api_token: None,
        };
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(WorkflowError::ValidationFailure(_))
        ));
    }
}
