//! Error taxonomy for backend calls

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Underlying cause of a failed attempt
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync>;

/// Classification of a failed backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response at all (refused, DNS, reset)
    Network,
    /// Connect or read timeout
    Timeout,
    /// Body could not be decoded
    BadResponse,
    /// Backend reported a failure
    ServerError,
    /// Error status with nothing in the body
    EmptyBody,
    Unknown,
}

impl ErrorKind {
    /// Failures where the request never produced a response
    pub fn is_network(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BadResponse => "bad_response",
            ErrorKind::ServerError => "server_error",
            ErrorKind::EmptyBody => "empty_body",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized failure, one per failed attempt
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Backend error code, or the HTTP status when the backend gave none
    pub code: Option<String>,
    pub message: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Message after template substitution
    pub display: Option<String>,
    #[serde(skip)]
    pub cause: Option<ErrorCause>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            status: None,
            display: None,
            cause: None,
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Message meant for end users
    pub fn display_message(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref code) = self.code {
            write!(f, " (code {})", code)?;
        }
        Ok(())
    }
}

/// Errors that cross the client boundary on the write path
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request never produced a response
    #[error("{method} {path} failed: {record}")]
    Failed {
        method: String,
        path: String,
        record: ErrorRecord,
    },

    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// The normalized record, if the failure reached the transport
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            TransportError::Failed { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.record().map(|r| r.kind).unwrap_or(ErrorKind::Unknown)
    }
}
