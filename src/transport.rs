//! Outbound HTTP client with retry, timeout and cancellation discipline.
//!
//! One logical `send` runs up to `max_retries + 1` attempts. Each attempt
//! gets its own timeout window; backoff doubles between attempts. An
//! externally supplied cancellation token and the internal per-attempt
//! timeout race against the transport call: whichever fires first drops the
//! in-flight future, so the underlying call is aborted exactly once and no
//! timer outlives the attempt.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RequestConfig;
use crate::error::NetworkError;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            body: Some(body),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Successful send plus how many attempts it took to get there.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub response: HttpResponse,
    pub attempts: u32,
}

/// Seam between the retry loop and the actual wire. Production uses
/// reqwest; tests inject scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        // status classification happens in the retry loop, not here
        let response = builder.send().await.map_err(NetworkError::connectivity)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(NetworkError::connectivity)?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn with_reqwest() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }

    /// Execute one logical request under the retry/timeout/cancellation
    /// policy in `config`.
    pub async fn send(
        &self,
        request: &HttpRequest,
        config: &RequestConfig,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, NetworkError> {
        let endpoint = endpoint_label(&request.url);
        let max_attempts = config.max_retries + 1;
        let mut last_error: Option<NetworkError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                // shift saturates so an arbitrarily large retry budget
                // cannot overflow the delay computation
                let factor = 1u64.checked_shl(attempt - 2).unwrap_or(u64::MAX);
                let delay = config.retry_delay_ms.saturating_mul(factor);
                debug!(attempt, delay_ms = delay, endpoint, "backing off before retry");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(NetworkError::aborted()),
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                }
            }

            metrics::REQUEST_ATTEMPTS.with_label_values(&[endpoint]).inc();
            let timer = metrics::Timer::new();

            let error = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NetworkError::aborted()),
                result = tokio::time::timeout(
                    Duration::from_millis(config.timeout_ms),
                    self.transport.execute(request),
                ) => {
                    match result {
                        Ok(Ok(response)) if response.status < 400 => {
                            timer.observe(&metrics::REQUEST_LATENCY.with_label_values(&[endpoint]));
                            return Ok(SendOutcome { response, attempts: attempt });
                        }
                        Ok(Ok(response)) => NetworkError::from_status(response.status, &response.body),
                        Ok(Err(err)) => err,
                        Err(_) => NetworkError::timeout(config.timeout_ms),
                    }
                }
            };

            if error.retryable && attempt < max_attempts {
                warn!(
                    attempt,
                    max_attempts,
                    endpoint,
                    error = %error,
                    "attempt failed, will retry"
                );
                metrics::REQUEST_RETRIES.inc();
                last_error = Some(error);
                continue;
            }

            metrics::REQUEST_FAILURES
                .with_label_values(&[error.kind.as_str()])
                .inc();
            return Err(error);
        }

        // retryable failure on the final attempt lands here
        let error = last_error
            .unwrap_or_else(|| NetworkError::connectivity("retry budget exhausted without attempts"));
        metrics::REQUEST_FAILURES
            .with_label_values(&[error.kind.as_str()])
            .inc();
        Err(error)
    }
}

/// Metric label for a URL: everything before the query string, so API keys
/// passed as query parameters never reach the metrics registry.
fn endpoint_label(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
