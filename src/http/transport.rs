use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::*;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use super::cache::ResponseCache;
use crate::config::{HttpSettings, ProxyConfig};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("received 304 for {url} but no cached response exists (cache key: {key:?})")]
    CacheMiss { url: String, key: Option<String> },
    #[error("{program} exited with {code:?}: {stderr}")]
    Process {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// A single GET request, independent of the transport that ends up serving it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub cache_key: Option<String>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cache_key: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One way of getting a response body for a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_body(&self, request: &FetchRequest) -> Result<String>;
}

// --- Primary: async client with retry, rate limiting and conditional requests ---

struct FeedRateLimiter {
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl reqwest_ratelimit::RateLimiter for FeedRateLimiter {
    async fn acquire_permit(&self) {
        self.rate_limiter.until_ready().await;
    }
}

pub struct PrimaryTransport {
    http_client: ClientWithMiddleware,
    cache: ResponseCache,
}

impl PrimaryTransport {
    pub fn new(settings: &HttpSettings, cache: ResponseCache) -> Result<Self> {
        let mut builder = reqwest_middleware::reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone());
        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(reqwest_middleware::reqwest::Proxy::all(&proxy.url)?);
        }
        let reqwest_client = builder.build().wrap_err("Failed to create HTTP client")?;

        // Delay doubles per attempt, starting at the configured initial backoff
        let max_backoff = settings
            .initial_backoff
            .saturating_mul(1u32 << settings.retries.min(16));
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(settings.initial_backoff, max_backoff)
            .build_with_max_retries(settings.retries);

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(nonzero!(1u32));
        let rate_limiter = FeedRateLimiter {
            rate_limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(per_second))),
        };

        let http_client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(reqwest_ratelimit::all(rate_limiter))
            .build();

        Ok(Self { http_client, cache })
    }
}

#[async_trait]
impl Transport for PrimaryTransport {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn get_body(&self, request: &FetchRequest) -> Result<String> {
        use reqwest_middleware::reqwest::{StatusCode, header};

        let mut builder = self
            .http_client
            .get(&request.url)
            .header(header::ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(tag) = request.cache_key.as_deref().and_then(|key| self.cache.etag(key)) {
            builder = builder.header(header::IF_NONE_MATCH, tag);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            let cached = request.cache_key.as_deref().and_then(|key| self.cache.cached_body(key));
            return match cached {
                Some(body) => {
                    debug!(url = %request.url, "Not modified, serving cached response");
                    Ok(body)
                }
                None => Err(HttpError::CacheMiss {
                    url: request.url.clone(),
                    key: request.cache_key.clone(),
                }
                .into()),
            };
        }

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: request.url.clone(),
            }
            .into());
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if let Some(key) = request.cache_key.as_deref() {
            if let Err(e) = self.cache.store(key, etag.as_deref(), &body) {
                warn!(cache_key = key, error = %e, "Failed to persist response cache");
            }
        }
        Ok(body)
    }
}

// --- Blocking: separate synchronous client stack, no cache ---

#[derive(Debug, Clone)]
pub struct BlockingTransport {
    timeout: Duration,
    user_agent: String,
    proxy: Option<ProxyConfig>,
}

impl BlockingTransport {
    pub fn new(settings: &HttpSettings, timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: settings.user_agent.clone(),
            proxy: settings.proxy.clone(),
        }
    }

    fn fetch(&self, request: &FetchRequest) -> Result<String> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(request.timeout.unwrap_or(self.timeout))
            .user_agent(self.user_agent.clone());
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(&proxy.url)?);
        }
        let client = builder.build()?;

        let mut req = client
            .get(&request.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ACCEPT_ENCODING, "identity");
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.send()?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: request.url.clone(),
            }
            .into());
        }
        Ok(response.text()?)
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    fn name(&self) -> &'static str {
        "blocking"
    }

    async fn get_body(&self, request: &FetchRequest) -> Result<String> {
        let transport = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || transport.fetch(&request)).await?
    }
}

// --- Curl: external process, survives sandboxes that block in-process sockets ---

#[derive(Debug, Clone)]
pub struct CurlTransport {
    program: String,
    max_time: Duration,
    user_agent: String,
    proxy: Option<ProxyConfig>,
}

impl CurlTransport {
    pub fn new(settings: &HttpSettings, max_time: Duration) -> Self {
        Self {
            program: "curl".to_string(),
            max_time,
            user_agent: settings.user_agent.clone(),
            proxy: settings.proxy.clone(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, request: &FetchRequest) -> Vec<String> {
        let max_time = request.timeout.unwrap_or(self.max_time).as_secs().max(1);
        let mut args: Vec<String> = vec![
            "-sS".into(),
            "-L".into(),
            "--fail".into(),
            "--max-time".into(),
            max_time.to_string(),
            "-H".into(),
            "Accept: application/json".into(),
            "-H".into(),
            "Accept-Encoding: identity".into(),
            "-H".into(),
            format!("User-Agent: {}", self.user_agent),
        ];
        for (name, value) in &request.headers {
            args.push("-H".into());
            args.push(format!("{name}: {value}"));
        }
        if let Some(proxy) = &self.proxy {
            args.push("-x".into());
            args.push(proxy.url.clone());
        }
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl Transport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    async fn get_body(&self, request: &FetchRequest) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.args(request))
            .kill_on_drop(true)
            .output()
            .await
            .wrap_err_with(|| format!("Failed to spawn {}", self.program))?;

        if !output.status.success() {
            return Err(HttpError::Process {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        String::from_utf8(output.stdout).wrap_err("curl returned non UTF-8 output")
    }
}
