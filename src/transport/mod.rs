//! Rate-limited, retrying HTTP transport.
//!
//! Every call to the service goes through [`Transport`]:
//! - a counting admission gate bounds how many requests are in flight
//! - a random politeness pause precedes each request
//! - [`RetryPolicy`] retries transient failures and cools down on throttling
//!
//! Exhaustion is reported as [`TransportError::Exhausted`], which callers
//! treat as a definitive "not available right now".

mod retry;

pub use retry::{AttemptError, IsRetryable, RetryPolicy};

use rand::Rng;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::stats::DownloadStats;

/// Longest error body kept for log lines.
const MAX_ERROR_BODY: usize = 200;

/// Decoded response body.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Binary { data: Vec<u8>, content_type: String },
}

impl Payload {
    pub fn into_json(self) -> Result<Value, TransportError> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Binary { content_type, .. } => Err(TransportError::UnexpectedPayload {
                expected: "application/json",
                content_type,
            }),
        }
    }

    /// Raw bytes; a JSON body is re-serialized.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Binary { data, .. } => data,
            Payload::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// One API call.
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    pub method: Method,
    pub endpoint: &'a str,
    pub query: Vec<(&'a str, String)>,
    pub json: Option<&'a Value>,
}

impl<'a> ApiRequest<'a> {
    pub fn get(endpoint: &'a str) -> Self {
        Self {
            method: Method::GET,
            endpoint,
            query: Vec::new(),
            json: None,
        }
    }

    pub fn post(endpoint: &'a str, body: &'a Value) -> Self {
        Self {
            method: Method::POST,
            endpoint,
            query: Vec::new(),
            json: Some(body),
        }
    }

    pub fn param(mut self, key: &'a str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{target}: gave up after {attempts} attempts ({last_error})")]
    Exhausted {
        target: String,
        attempts: u32,
        /// The final attempt was refused with the throttling status
        throttled: bool,
        last_error: String,
    },

    #[error("{target}: {reason}")]
    Aborted { target: String, reason: String },

    #[error("Expected {expected}, got '{content_type}'")]
    UnexpectedPayload {
        expected: &'static str,
        content_type: String,
    },

    #[error("Admission gate closed")]
    GateClosed,
}

/// Concurrency-bounded HTTP executor.
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    gate: Semaphore,
    retry: RetryPolicy,
    politeness_ms: (u64, u64),
    timeout: Duration,
    stream_timeout: Duration,
    stats: Arc<DownloadStats>,
}

impl Transport {
    pub fn new(config: &Config, stats: Arc<DownloadStats>) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.service.base_url)
            .map_err(|_| TransportError::InvalidUrl(config.service.base_url.clone()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        if !config.service.token.is_empty() {
            let token = &config.service.token;
            headers.insert(
                "x-auth-token",
                HeaderValue::from_str(token)
                    .map_err(|e| TransportError::InvalidHeader(e.to_string()))?,
            );
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("auth={}", token))
                    .map_err(|e| TransportError::InvalidHeader(e.to_string()))?,
            );
        }

        let http = reqwest::Client::builder()
            .gzip(true)
            .user_agent(config.service.user_agent.clone())
            .default_headers(headers)
            .build()?;

        let network = &config.network;
        let (min, max) = (network.politeness_min_ms, network.politeness_max_ms);

        Ok(Self {
            http,
            base_url,
            gate: Semaphore::new(network.concurrent_requests.max(1)),
            retry: RetryPolicy::new(
                network.max_retries,
                network.retry_delay(),
                network.throttle_multiplier,
            ),
            politeness_ms: (min.min(max), max.max(min)),
            timeout: network.timeout(),
            stream_timeout: network.stream_timeout(),
            stats,
        })
    }

    pub fn stats(&self) -> &Arc<DownloadStats> {
        &self.stats
    }

    /// Execute an API call, retrying per the policy.
    pub async fn request(&self, request: ApiRequest<'_>) -> Result<Payload, TransportError> {
        let url = self.resolve(request.endpoint)?;
        let _permit = self.gate.acquire().await.map_err(|_| TransportError::GateClosed)?;
        self.polite_pause().await;

        tracing::debug!(method = %request.method, url = %url, "Sending request");
        let (request, url) = (&request, &url);
        self.retry
            .run(request.endpoint, move |_| self.attempt(request, url))
            .await
    }

    pub async fn get_json(&self, request: ApiRequest<'_>) -> Result<Value, TransportError> {
        self.request(request).await?.into_json()
    }

    /// Fetch an absolute URL (or endpoint) as raw bytes, e.g. cover art.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        Ok(self.request(ApiRequest::get(url)).await?.into_bytes())
    }

    /// Stream `url` into `path`, returning the number of bytes written.
    ///
    /// Each retry truncates and rewrites the file.
    pub async fn stream_to_file(&self, url: &str, path: &Path) -> Result<u64, TransportError> {
        let resolved = self.resolve(url)?;
        let _permit = self.gate.acquire().await.map_err(|_| TransportError::GateClosed)?;
        self.polite_pause().await;

        let resolved = &resolved;
        self.retry
            .run(url, move |_| self.stream_attempt(resolved, path))
            .await
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(endpoint)
            .map_err(|_| TransportError::InvalidUrl(endpoint.to_string()))
    }

    async fn polite_pause(&self) {
        let (min, max) = self.politeness_ms;
        if max == 0 {
            return;
        }
        let ms = rand::rng().random_range(min..=max);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn attempt(&self, request: &ApiRequest<'_>, url: &Url) -> Result<Payload, AttemptError> {
        self.stats.record_request();

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(AttemptError::from_reqwest)?;
        let response = check_status(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("application/json") {
            let value = response
                .json::<Value>()
                .await
                .map_err(AttemptError::from_reqwest)?;
            Ok(Payload::Json(value))
        } else {
            let data = response
                .bytes()
                .await
                .map_err(AttemptError::from_reqwest)?
                .to_vec();
            Ok(Payload::Binary { data, content_type })
        }
    }

    async fn stream_attempt(&self, url: &Url, path: &Path) -> Result<u64, AttemptError> {
        self.stats.record_request();

        let response = self
            .http
            .get(url.clone())
            .timeout(self.stream_timeout)
            .send()
            .await
            .map_err(AttemptError::from_reqwest)?;
        let mut response = check_status(response).await?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| AttemptError::Fatal(format!("cannot create {:?}: {}", path, e)))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(AttemptError::from_reqwest)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| AttemptError::Fatal(format!("write to {:?} failed: {}", path, e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| AttemptError::Fatal(format!("flush of {:?} failed: {}", path, e)))?;

        Ok(written)
    }
}

/// Map non-200 replies to attempt errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AttemptError> {
    let status = response.status();
    if status == StatusCode::IM_A_TEAPOT {
        return Err(AttemptError::Throttled);
    }
    if status != StatusCode::OK {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        return Err(AttemptError::Status { status, body });
    }
    Ok(response)
}
