//! Transport client shared by every backend
//!
//! Wraps a lazily built `reqwest` connection pool with the response cache
//! (GET only), the retry policy and the error normalizer. Read calls absorb
//! failures; write calls surface network failures to the caller.

use super::error::{ErrorRecord, TransportError};
use super::normalizer::{ErrorNormalizer, ErrorSchema, MessageTemplate, RawFailure};
use super::request::{HttpMethod, Request, Response};
use super::retry::RetryPolicy;
use crate::cache::{cache_key, ResponseCache};
use crate::config::BackendSettings;
use crate::metrics::TransportMetrics;
use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Outcome of a single network attempt
enum Attempt {
    /// The backend answered, successfully or not
    Completed(Response),
    /// No response object at all
    NoResponse(ErrorRecord),
}

impl Attempt {
    fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Attempt::Completed(response) => response.error(),
            Attempt::NoResponse(record) => Some(record),
        }
    }
}

/// Error and response left by the most recent call
#[derive(Debug, Clone, Default)]
pub struct LastCall {
    /// Cleared by a success
    pub error: Option<ErrorRecord>,
    /// `None` when the call got no response at all
    pub response: Option<Response>,
}

/// HTTP client for one backend, safe to share across tasks
pub struct TransportClient {
    name: String,
    base_url: String,
    timeout: Duration,
    open_timeout: Duration,
    pool_max_idle_per_host: usize,
    http: OnceCell<Client>,
    cache: Option<ResponseCache>,
    retry: RetryPolicy,
    normalizer: ErrorNormalizer,
    last_call: RwLock<LastCall>,
    metrics: TransportMetrics,
}

impl TransportClient {
    /// Create a client from backend settings
    ///
    /// No connection is opened until the first call.
    pub fn new(name: impl Into<String>, settings: &BackendSettings, schema: ErrorSchema) -> Result<Self> {
        let name = name.into();

        Url::parse(&settings.base_url)
            .with_context(|| format!("invalid base_url for {}: '{}'", name, settings.base_url))?;

        let timeout = Duration::try_from_secs_f64(settings.timeout)
            .map_err(|e| anyhow!("invalid timeout for {}: {}", name, e))?;
        let open_timeout = Duration::try_from_secs_f64(settings.open_timeout)
            .map_err(|e| anyhow!("invalid open_timeout for {}: {}", name, e))?;

        let retry = RetryPolicy::from_settings(&settings.retry)
            .with_context(|| format!("invalid retry settings for {}", name))?;

        let templates = settings
            .message_templates
            .iter()
            .map(MessageTemplate::from_config)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("invalid message template for {}", name))?;

        let normalizer = ErrorNormalizer::new(&name, schema)
            .with_internal_marker(&settings.internal_error_marker)
            .with_templates(templates);

        let cache = settings
            .cache
            .enabled
            .then(|| ResponseCache::from_settings(&settings.cache));

        Ok(Self {
            name,
            base_url: settings.base_url.clone(),
            timeout,
            open_timeout,
            pool_max_idle_per_host: settings.pool_max_idle_per_host,
            http: OnceCell::new(),
            cache,
            retry,
            normalizer,
            last_call: RwLock::new(LastCall::default()),
            metrics: TransportMetrics::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Empty request rooted at this client's base URL
    pub fn request(&self) -> Request {
        Request::new(&self.base_url)
    }

    /// Whether the connection pool has been created
    pub fn is_connected(&self) -> bool {
        self.http.get().is_some()
    }

    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    /// Error and response of the most recent call, read together
    ///
    /// Shared by every caller of this client; a caller wanting its own
    /// outcome should use the value returned by the call.
    pub fn last_call(&self) -> LastCall {
        self.last_call
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Error from the most recent failed call, cleared by the next success
    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.last_call().error
    }

    /// Response of the most recent call
    pub fn last_response(&self) -> Option<Response> {
        self.last_call().response
    }

    /// Read call: any failure is absorbed and recorded as `last_error`
    pub async fn read(&self, request: &Request) -> Option<Response> {
        match self.fetch(HttpMethod::Get, request).await {
            Ok(response) if response.is_success() => Some(response),
            Ok(_) => None,
            Err(e) => {
                debug!("{}: read failed, returning no result: {}", self.name, e);
                None
            }
        }
    }

    /// Write call: network failures are returned as errors, HTTP error
    /// statuses come back as a failed [`Response`]
    pub async fn write(&self, request: &Request) -> Result<Response, TransportError> {
        self.fetch(HttpMethod::Post, request).await
    }

    /// Drop the cached response for `request`, if any
    pub async fn invalidate(&self, request: &Request) {
        if let (Some(cache), Ok(url)) = (&self.cache, request.url()) {
            cache.invalidate(&cache_key(HttpMethod::Get, &url)).await;
        }
    }

    /// Perform a call with caching and retry
    pub async fn fetch(&self, method: HttpMethod, request: &Request) -> Result<Response, TransportError> {
        self.metrics.record_request();
        let operation = format!("{} {}", method, request.path());

        let url = request.url().map_err(|e| {
            error!("{} {}: {}", self.name, operation, e);
            self.metrics.record_failure();
            e
        })?;

        let key = match (&self.cache, method.is_idempotent()) {
            (Some(_), true) => Some(cache_key(method, &url)),
            _ => None,
        };

        if let Some(response) = self.cached(key.as_deref(), &operation).await {
            return Ok(response);
        }

        let http = self.http().map_err(|e| {
            error!("{} {}: {}", self.name, operation, e);
            self.metrics.record_failure();
            e
        })?;

        let mut attempt: u32 = 0;
        let mut previous_wait = Duration::ZERO;

        loop {
            self.metrics.record_attempt();

            match self.attempt(http, method, &url, request, &operation).await {
                Attempt::Completed(response) if response.is_success() => {
                    if let (Some(cache), Some(key)) = (&self.cache, &key) {
                        let body = response.raw_body().unwrap_or_default().as_bytes().to_vec();
                        cache.put_default(key.clone(), body).await;
                    }
                    self.metrics.record_success();
                    self.set_last_call(None, Some(&response));
                    return Ok(response);
                }
                failed => {
                    let retry = failed
                        .record()
                        .map_or(false, |record| self.retry.should_retry(attempt, record));

                    if retry {
                        let wait = self.retry.next_wait(attempt, previous_wait);
                        previous_wait = wait;
                        warn!(
                            "{} {}: attempt {} of {} failed, retrying in {:?}",
                            self.name,
                            operation,
                            attempt + 1,
                            self.retry.max_attempts(),
                            wait
                        );
                        self.metrics.record_retry();
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }

                    self.metrics.record_failure();

                    return match failed {
                        Attempt::Completed(response) => {
                            self.set_last_call(response.error().cloned(), Some(&response));
                            Ok(response)
                        }
                        Attempt::NoResponse(record) => {
                            self.set_last_call(Some(record.clone()), None);
                            Err(TransportError::Failed {
                                method: method.to_string(),
                                path: request.path(),
                                record,
                            })
                        }
                    };
                }
            }
        }
    }

    async fn cached(&self, key: Option<&str>, operation: &str) -> Option<Response> {
        let (cache, key) = match (&self.cache, key) {
            (Some(cache), Some(key)) => (cache, key),
            _ => return None,
        };

        let body = cache.get(key).await?;
        let text = String::from_utf8_lossy(&body).into_owned();

        match parse_body(&text) {
            Ok(parsed) => {
                debug!("{} {}: cache hit", self.name, operation);
                self.metrics.record_cache_hit();
                self.metrics.record_success();
                let raw = (!text.is_empty()).then_some(text);
                let response = Response::success(200, raw, parsed, true);
                self.set_last_call(None, Some(&response));
                Some(response)
            }
            Err(e) => {
                warn!("{} {}: dropping unreadable cache entry: {}", self.name, operation, e);
                cache.invalidate(key).await;
                None
            }
        }
    }

    async fn attempt(
        &self,
        http: &Client,
        method: HttpMethod,
        url: &Url,
        request: &Request,
        operation: &str,
    ) -> Attempt {
        let mut builder = match method {
            HttpMethod::Get => http.get(url.clone()),
            HttpMethod::Post => http.post(url.clone()),
        };
        builder = builder.header(ACCEPT, "application/json");

        if let Some(ref body) = request.body_params {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::NoResponse(self.transport_failure(operation, e)),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => Attempt::Completed(self.classify(operation, status, text)),
            Err(e) => Attempt::NoResponse(self.transport_failure(operation, e)),
        }
    }

    fn transport_failure(&self, operation: &str, e: reqwest::Error) -> ErrorRecord {
        self.normalizer.normalize(
            operation,
            RawFailure::Transport {
                timed_out: e.is_timeout(),
                cause: Some(Arc::new(e)),
            },
        )
    }

    fn classify(&self, operation: &str, status: u16, text: String) -> Response {
        if !(200..300).contains(&status) {
            let record = self
                .normalizer
                .normalize(operation, RawFailure::Status { status, body: &text });
            let raw = (!text.is_empty()).then_some(text);
            return Response::failure(status, raw, record);
        }

        match parse_body(&text) {
            Ok(parsed) => {
                let raw = (!text.is_empty()).then_some(text);
                Response::success(status, raw, parsed, false)
            }
            Err(cause) => {
                let record = self.normalizer.normalize(
                    operation,
                    RawFailure::Undecodable {
                        status,
                        body: &text,
                        cause,
                    },
                );
                Response::failure(status, Some(text), record)
            }
        }
    }

    fn http(&self) -> Result<&Client, TransportError> {
        self.http
            .get_or_try_init(|| {
                debug!("{}: opening connection pool to {}", self.name, self.base_url);
                Client::builder()
                    .timeout(self.timeout)
                    .connect_timeout(self.open_timeout)
                    .pool_max_idle_per_host(self.pool_max_idle_per_host)
                    .user_agent(concat!("catalog-lens/", env!("CARGO_PKG_VERSION")))
                    .gzip(true)
                    .brotli(true)
                    .build()
            })
            .map_err(|e| TransportError::Client(e.to_string()))
    }

    fn set_last_call(&self, error: Option<ErrorRecord>, response: Option<&Response>) {
        *self.last_call.write().unwrap_or_else(PoisonError::into_inner) = LastCall {
            error,
            response: response.cloned(),
        };
    }
}

/// Empty bodies parse as JSON `null`
fn parse_body(text: &str) -> serde_json::Result<Value> {
    if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str(text)
    }
}
