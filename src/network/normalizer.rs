//! Turns raw transport failures into [`ErrorRecord`]s
//!
//! Every backend reports failures differently. The normalizer decodes the
//! backend's structured error payload when there is one, falls back to a
//! marker-string check for unstructured internal failures, and logs exactly
//! one line per failed attempt.

use super::error::{ErrorCause, ErrorKind, ErrorRecord};
use crate::config::MessageTemplateConfig;
use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use tracing::{error, warn};

/// Structured error payload layout of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSchema {
    /// `{"error": {"msg": "...", "code": 400}}`
    Solr,
    /// `{"ErrorNumber": "...", "ErrorDescription": "...", "DetailedErrorDescription": "..."}`
    Eds,
    /// `{"error": "..."}` or `{"error": {"message": "...", "code": "..."}}`
    Firehose,
}

impl ErrorSchema {
    /// Decode `(code, message)` from a structured error body
    pub fn decode(&self, body: &str) -> Option<(Option<String>, String)> {
        let json: Value = serde_json::from_str(body).ok()?;

        let (code, message) = match self {
            ErrorSchema::Solr => {
                let error = json.get("error")?;
                (
                    error.get("code").and_then(code_string),
                    error.get("msg").and_then(|m| m.as_str()).map(String::from),
                )
            }
            ErrorSchema::Eds => {
                let description = json.get("ErrorDescription").and_then(|d| d.as_str());
                let detail = json
                    .get("DetailedErrorDescription")
                    .and_then(|d| d.as_str())
                    .filter(|d| !d.is_empty());
                let message = match (description, detail) {
                    (Some(d), Some(detail)) => Some(format!("{}: {}", d, detail)),
                    (Some(d), None) => Some(d.to_string()),
                    (None, detail) => detail.map(String::from),
                };
                (json.get("ErrorNumber").and_then(code_string), message)
            }
            ErrorSchema::Firehose => match json.get("error") {
                Some(Value::String(message)) => (
                    json.get("code").and_then(code_string),
                    Some(message.clone()),
                ),
                Some(error) => (
                    error.get("code").and_then(code_string),
                    error.get("message").and_then(|m| m.as_str()).map(String::from),
                ),
                None => (
                    json.get("code").and_then(code_string),
                    json.get("message").and_then(|m| m.as_str()).map(String::from),
                ),
            },
        };

        message.map(|m| (code, m))
    }
}

fn code_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A failure as observed by the transport, before classification
pub enum RawFailure<'a> {
    /// No response object at all
    Transport {
        timed_out: bool,
        cause: Option<ErrorCause>,
    },
    /// Non-2xx response
    Status { status: u16, body: &'a str },
    /// 2xx response whose body is not valid JSON
    Undecodable {
        status: u16,
        body: &'a str,
        cause: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Literal(String),
    Pattern(Regex),
}

/// Message template, matched against the normalized message
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    matcher: Matcher,
    template: String,
}

impl MessageTemplate {
    /// Template applied to every message
    pub fn fallback(template: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::Any,
            template: template.into(),
        }
    }

    /// Template applied when the message contains `needle`
    pub fn literal(needle: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::Literal(needle.into()),
            template: template.into(),
        }
    }

    /// Template applied when the message matches `pattern`
    pub fn regex(pattern: &str, template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::Pattern(Regex::new(pattern)?),
            template: template.into(),
        })
    }

    pub fn from_config(config: &MessageTemplateConfig) -> Result<Self> {
        match (&config.pattern, config.regex) {
            (None, _) => Ok(Self::fallback(&config.template)),
            (Some(pattern), true) => Self::regex(pattern, &config.template),
            (Some(pattern), false) => Ok(Self::literal(pattern, &config.template)),
        }
    }

    fn matches(&self, message: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Literal(needle) => message.contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(message),
        }
    }

    fn render(&self, message: &str) -> String {
        self.template.replace("{message}", message)
    }
}

/// Classifies failures for one backend client
#[derive(Debug, Clone)]
pub struct ErrorNormalizer {
    client: String,
    schema: ErrorSchema,
    internal_marker: String,
    templates: Vec<MessageTemplate>,
}

impl ErrorNormalizer {
    pub fn new(client: impl Into<String>, schema: ErrorSchema) -> Self {
        Self {
            client: client.into(),
            schema,
            internal_marker: "Internal Server Error".to_string(),
            templates: Vec::new(),
        }
    }

    /// Body substring marking an unstructured internal failure
    pub fn with_internal_marker(mut self, marker: impl Into<String>) -> Self {
        self.internal_marker = marker.into();
        self
    }

    /// Template table, first match wins
    pub fn with_templates(mut self, templates: Vec<MessageTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Produce exactly one record for `failure` and log it
    ///
    /// `operation` identifies the call in the log line, e.g. `GET items/42`.
    pub fn normalize(&self, operation: &str, failure: RawFailure<'_>) -> ErrorRecord {
        let (mut record, body, decoded) = match failure {
            RawFailure::Transport { timed_out, cause } => {
                let kind = if timed_out {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Network
                };
                let mut record = ErrorRecord::new(kind, "no result");
                record.cause = cause;
                (record, "", false)
            }
            RawFailure::Status { status, body } => {
                let (record, decoded) = self.classify_status(status, body);
                (record, body, decoded)
            }
            RawFailure::Undecodable {
                status,
                body,
                cause,
            } => {
                let record = ErrorRecord::new(
                    ErrorKind::BadResponse,
                    format!("malformed response: {}", cause),
                )
                .with_status(status)
                .with_cause(std::sync::Arc::new(cause));
                (record, body, false)
            }
        };

        record.display = self.render_message(&record.message);
        self.log(operation, &record, body, decoded);
        record
    }

    fn classify_status(&self, status: u16, body: &str) -> (ErrorRecord, bool) {
        let status_code = Some(status.to_string());

        if body.trim().is_empty() {
            let record = ErrorRecord::new(ErrorKind::EmptyBody, "empty response body")
                .with_code(status_code)
                .with_status(status);
            return (record, false);
        }

        if let Some((code, message)) = self.schema.decode(body) {
            if !message.trim().is_empty() {
                let record = ErrorRecord::new(ErrorKind::ServerError, message)
                    .with_code(code.or(status_code))
                    .with_status(status);
                return (record, true);
            }
        }

        if !self.internal_marker.is_empty() && body.contains(self.internal_marker.as_str()) {
            let record = ErrorRecord::new(ErrorKind::ServerError, "internal server error")
                .with_code(status_code)
                .with_status(status);
            return (record, false);
        }

        let record = ErrorRecord::new(ErrorKind::Unknown, "unknown failure")
            .with_code(status_code)
            .with_status(status);
        (record, false)
    }

    /// Substitute `message` into the first matching template
    pub fn render_message(&self, message: &str) -> Option<String> {
        self.templates
            .iter()
            .find(|t| t.matches(message))
            .map(|t| t.render(message))
    }

    fn log(&self, operation: &str, record: &ErrorRecord, body: &str, decoded: bool) {
        let line = render_log_line(&self.client, operation, record, body);
        if decoded {
            warn!("{}", line);
        } else {
            error!("{}", line);
        }
    }
}

/// `"{client} {method}: {message}; code {code}; body {body}"`, body only if non-empty
pub fn render_log_line(client: &str, operation: &str, record: &ErrorRecord, body: &str) -> String {
    let mut line = format!(
        "{} {}: {}; code {}",
        client,
        operation,
        record.message,
        record.code.as_deref().unwrap_or("none")
    );
    if !body.is_empty() {
        line.push_str("; body ");
        line.push_str(body);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(schema: ErrorSchema) -> ErrorNormalizer {
        ErrorNormalizer::new("test", schema)
    }

    #[test]
    fn test_no_response_is_network() {
        let record = normalizer(ErrorSchema::Solr).normalize(
            "GET suggest",
            RawFailure::Transport {
                timed_out: false,
                cause: None,
            },
        );
        assert_eq!(record.kind, ErrorKind::Network);
        assert_eq!(record.message, "no result");
        assert!(record.code.is_none());
        assert!(record.status.is_none());
    }

    #[test]
    fn test_timeout_kind() {
        let record = normalizer(ErrorSchema::Firehose).normalize(
            "POST requests",
            RawFailure::Transport {
                timed_out: true,
                cause: None,
            },
        );
        assert_eq!(record.kind, ErrorKind::Timeout);
    }

    #[test]
    fn test_empty_body() {
        let record = normalizer(ErrorSchema::Eds).normalize(
            "GET edsapi/rest/Search",
            RawFailure::Status {
                status: 502,
                body: "  ",
            },
        );
        assert_eq!(record.kind, ErrorKind::EmptyBody);
        assert_eq!(record.status, Some(502));
    }

    #[test]
    fn test_structured_solr_error() {
        let body = r#"{"responseHeader":{"status":400},"error":{"msg":"undefined field foo","code":400}}"#;
        let record = normalizer(ErrorSchema::Solr)
            .normalize("GET select", RawFailure::Status { status: 400, body });
        assert_eq!(record.kind, ErrorKind::ServerError);
        assert_eq!(record.message, "undefined field foo");
        assert_eq!(record.code.as_deref(), Some("400"));
    }

    #[test]
    fn test_structured_eds_error() {
        let body = r#"{"DetailedErrorDescription":"Profile: edsapi","ErrorDescription":"Invalid Profile","ErrorNumber":"144"}"#;
        let record = normalizer(ErrorSchema::Eds)
            .normalize("GET edsapi/rest/Search", RawFailure::Status { status: 400, body });
        assert_eq!(record.kind, ErrorKind::ServerError);
        assert_eq!(record.message, "Invalid Profile: Profile: edsapi");
        assert_eq!(record.code.as_deref(), Some("144"));
    }

    #[test]
    fn test_structured_firehose_error_shapes() {
        let schema = ErrorSchema::Firehose;
        assert_eq!(
            schema.decode(r#"{"error":"Item not found"}"#),
            Some((None, "Item not found".to_string()))
        );
        assert_eq!(
            schema.decode(r#"{"error":{"message":"Patron blocked","code":"PB1"}}"#),
            Some((Some("PB1".to_string()), "Patron blocked".to_string()))
        );
        assert_eq!(schema.decode("<html>nope</html>"), None);
    }

    #[test]
    fn test_empty_structured_message_falls_through() {
        let body = r#"{"error":{"msg":"","code":500}} Internal Server Error"#;
        // Not valid JSON, so decoding fails and the marker applies
        let record = normalizer(ErrorSchema::Solr)
            .normalize("GET select", RawFailure::Status { status: 500, body });
        assert_eq!(record.kind, ErrorKind::ServerError);
        assert_eq!(record.message, "internal server error");

        let body = r#"{"error":{"msg":"","code":500}}"#;
        let record = normalizer(ErrorSchema::Solr)
            .normalize("GET select", RawFailure::Status { status: 500, body });
        assert_eq!(record.kind, ErrorKind::Unknown);
        assert_eq!(record.message, "unknown failure");
    }

    #[test]
    fn test_internal_marker() {
        let body = "<html><h1>Internal Server Error</h1></html>";
        let record = normalizer(ErrorSchema::Firehose)
            .normalize("GET items/1", RawFailure::Status { status: 500, body });
        assert_eq!(record.kind, ErrorKind::ServerError);
        assert_eq!(record.message, "internal server error");
        assert_eq!(record.code.as_deref(), Some("500"));
    }

    #[test]
    fn test_custom_marker() {
        let body = "java.lang.NullPointerException at ...";
        let record = normalizer(ErrorSchema::Solr)
            .with_internal_marker("java.lang.")
            .normalize("GET suggest", RawFailure::Status { status: 500, body });
        assert_eq!(record.kind, ErrorKind::ServerError);
    }

    #[test]
    fn test_unknown_failure() {
        let record = normalizer(ErrorSchema::Firehose).normalize(
            "GET items/1",
            RawFailure::Status {
                status: 418,
                body: "teapot",
            },
        );
        assert_eq!(record.kind, ErrorKind::Unknown);
        assert_eq!(record.message, "unknown failure");
    }

    #[test]
    fn test_undecodable_success_body() {
        let cause = serde_json::from_str::<Value>("{oops").unwrap_err();
        let record = normalizer(ErrorSchema::Eds).normalize(
            "GET edsapi/rest/Search",
            RawFailure::Undecodable {
                status: 200,
                body: "{oops",
                cause,
            },
        );
        assert_eq!(record.kind, ErrorKind::BadResponse);
        assert!(record.message.starts_with("malformed response"));
        assert!(record.cause.is_some());
    }

    #[test]
    fn test_templates_first_match_wins() {
        let templates = vec![
            MessageTemplate::literal("not found", "Unavailable: {message}"),
            MessageTemplate::regex(r"^Patron \w+$", "Account problem").unwrap(),
            MessageTemplate::fallback("Something went wrong"),
        ];
        let normalizer = normalizer(ErrorSchema::Firehose).with_templates(templates);

        assert_eq!(
            normalizer.render_message("item not found").as_deref(),
            Some("Unavailable: item not found")
        );
        assert_eq!(
            normalizer.render_message("Patron blocked").as_deref(),
            Some("Account problem")
        );
        assert_eq!(
            normalizer.render_message("boom").as_deref(),
            Some("Something went wrong")
        );

        let record = normalizer.normalize(
            "POST requests",
            RawFailure::Status {
                status: 404,
                body: r#"{"error":"item not found"}"#,
            },
        );
        assert_eq!(record.display.as_deref(), Some("Unavailable: item not found"));
    }

    #[test]
    fn test_no_templates_no_display() {
        assert!(normalizer(ErrorSchema::Solr).render_message("boom").is_none());
    }

    #[test]
    fn test_template_from_config() {
        let config = MessageTemplateConfig {
            pattern: Some("^time".to_string()),
            regex: true,
            template: "Try again later".to_string(),
        };
        let template = MessageTemplate::from_config(&config).unwrap();
        assert!(template.matches("timeout"));
        assert!(!template.matches("a timeout"));

        let bad = MessageTemplateConfig {
            pattern: Some("(".to_string()),
            regex: true,
            template: String::new(),
        };
        assert!(MessageTemplate::from_config(&bad).is_err());
    }

    #[test]
    fn test_log_line() {
        let record = ErrorRecord::new(ErrorKind::ServerError, "bad query")
            .with_code(Some("400".into()));
        assert_eq!(
            render_log_line("catalog", "GET suggest", &record, "{}"),
            "catalog GET suggest: bad query; code 400; body {}"
        );
        assert_eq!(
            render_log_line("catalog", "GET suggest", &ErrorRecord::new(ErrorKind::Network, "no result"), ""),
            "catalog GET suggest: no result; code none"
        );
    }
}
