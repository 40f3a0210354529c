//! Request and response types shared by every backend client

use super::error::{ErrorRecord, TransportError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    /// Only idempotent requests may be answered from the cache
    pub fn is_idempotent(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against a backend, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Backend base URL
    pub base_url: String,
    /// Path segments appended to the base URL
    pub path_segments: Vec<String>,
    /// Flattened query parameters
    pub query_params: BTreeMap<String, String>,
    /// JSON payload for write calls
    pub body_params: Option<Value>,
}

impl Request {
    /// Create a request rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path_segments: Vec::new(),
            query_params: BTreeMap::new(),
            body_params: None,
        }
    }

    /// Append a path segment
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.path_segments.push(segment.into());
        self
    }

    /// Append several path segments
    pub fn segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_segments
            .extend(segments.into_iter().map(Into::into));
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Replace all query parameters
    pub fn params(mut self, params: BTreeMap<String, String>) -> Self {
        self.query_params = params;
        self
    }

    /// Attach a JSON payload
    pub fn json(mut self, body: Value) -> Self {
        self.body_params = Some(body);
        self
    }

    /// Path relative to the base URL, used in log lines
    pub fn path(&self) -> String {
        self.path_segments.join("/")
    }

    /// Resolve the full URL, query string included
    pub fn url(&self) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| TransportError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if !self.path_segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| TransportError::InvalidUrl {
                    url: self.base_url.clone(),
                    reason: "URL cannot be a base".to_string(),
                })?
                .pop_if_empty()
                .extend(&self.path_segments);
        }

        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query_params.iter());
        }

        Ok(url)
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Success(Value),
    Failure(ErrorRecord),
}

/// Response from a backend call
///
/// A response is either a success carrying a parsed body or a failure
/// carrying an [`ErrorRecord`], never both.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    raw_body: Option<String>,
    outcome: Outcome,
    from_cache: bool,
}

impl Response {
    /// Successful response with a parsed JSON body
    pub fn success(status: u16, raw_body: Option<String>, parsed: Value, from_cache: bool) -> Self {
        Self {
            status,
            raw_body,
            outcome: Outcome::Success(parsed),
            from_cache,
        }
    }

    /// Failed response that still reached the backend
    pub fn failure(status: u16, raw_body: Option<String>, error: ErrorRecord) -> Self {
        Self {
            status,
            raw_body,
            outcome: Outcome::Failure(error),
            from_cache: false,
        }
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Body text as received
    pub fn raw_body(&self) -> Option<&str> {
        self.raw_body.as_deref()
    }

    /// Parsed JSON body, present only on success
    pub fn parsed_body(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Normalized error, present only on failure
    pub fn error(&self) -> Option<&ErrorRecord> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Whether the response was served from the cache
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Check if the response is a success
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_url_appends_segments_and_sorted_params() {
        let request = Request::new("http://localhost:8983/solr/core")
            .segment("suggest")
            .param("wt", "json")
            .param("q", "cat food");

        let url = request.url().unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8983/solr/core/suggest?q=cat+food&wt=json"
        );
    }

    #[test]
    fn test_url_with_trailing_slash_base() {
        let request = Request::new("http://firehose:8080/").segments(["items", "123"]);
        assert_eq!(request.url().unwrap().as_str(), "http://firehose:8080/items/123");
        assert_eq!(request.path(), "items/123");
    }

    #[test]
    fn test_invalid_base_url() {
        let request = Request::new("not a url").segment("x");
        assert!(matches!(
            request.url(),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_response_is_success_or_failure() {
        let ok = Response::success(200, Some("{}".into()), json!({}), false);
        assert!(ok.is_success());
        assert!(ok.parsed_body().is_some());
        assert!(ok.error().is_none());

        let failed = Response::failure(
            500,
            None,
            ErrorRecord::new(ErrorKind::ServerError, "internal server error"),
        );
        assert!(!failed.is_success());
        assert!(failed.parsed_body().is_none());
        assert_eq!(failed.error().map(|e| e.kind), Some(ErrorKind::ServerError));
    }
}
