use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkErrorKind {
    /// Connectivity failure, no response received
    Network,
    /// Per-attempt timeout window expired
    Timeout,
    /// Caller-initiated cancellation, never retried
    Aborted,
    /// Upstream answered with an error status
    Http,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::Network => "network",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Aborted => "aborted",
            NetworkErrorKind::Http => "http",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed outbound call, already classified for retry purposes.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct NetworkError {
    pub message: String,
    pub http_status: Option<u16>,
    pub kind: NetworkErrorKind,
    pub retryable: bool,
}

impl NetworkError {
    pub fn connectivity(err: impl fmt::Display) -> Self {
        Self {
            message: err.to_string(),
            http_status: None,
            kind: NetworkErrorKind::Network,
            retryable: true,
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self {
            message: format!("no response within {}ms", timeout_ms),
            http_status: None,
            kind: NetworkErrorKind::Timeout,
            retryable: true,
        }
    }

    pub fn aborted() -> Self {
        Self {
            message: "request cancelled by caller".to_string(),
            http_status: None,
            kind: NetworkErrorKind::Aborted,
            retryable: false,
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            message: format!("upstream returned HTTP {}: {}", status, excerpt(body, 120)),
            http_status: Some(status),
            kind: NetworkErrorKind::Http,
            retryable: status_is_retryable(status),
        }
    }
}

/// 5xx, 408 and 429 are worth another attempt; other 4xx are not.
pub fn status_is_retryable(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Truncate a payload for error messages and logs, keeping char boundaries intact.
pub fn excerpt(payload: &str, max_chars: usize) -> String {
    if payload.chars().count() <= max_chars {
        payload.to_string()
    } else {
        let mut out: String = payload.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

/// Error taxonomy surfaced to engine callers.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// No usable subject in the image; terminal, caller must re-capture
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Upstream structured response unusable even after fallback extraction
    #[error("unparseable upstream payload: {message}")]
    Parse { message: String, excerpt: String },

    /// Required credential or endpoint missing at startup; fatal
    #[error("configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn parse(message: impl Into<String>, payload: &str) -> Self {
        AnalysisError::Parse {
            message: message.into(),
            excerpt: excerpt(payload, 200),
        }
    }
}
