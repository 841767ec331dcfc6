//! HTTP client shared by every network-facing backend.
//!
//! Backends talk to the network through the [`Fetch`] trait so tests can
//! substitute canned responses. [`HttpClient`] is the production
//! implementation: reqwest plus adaptive per-host spacing.

#[cfg(any(test, feature = "testing"))]
mod canned;
mod cookies;
mod user_agent;

#[cfg(any(test, feature = "testing"))]
pub use canned::CannedFetch;
pub use cookies::{load_cookie_jar, parse_cookie_file, CookieError, SessionCookie};
pub use user_agent::{resolve_user_agent, DEFAULT_USER_AGENT, TOOL_USER_AGENT};

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::rate_limiter::RateLimiter;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Build from a reqwest failure. Credentials in the query string are
    /// redacted, and the URL reqwest embeds in its own message is dropped.
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = redact_url(url);
        if err.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Request {
                url,
                message: err.without_url().to_string(),
            }
        }
    }
}

/// Query parameters that carry credentials.
const SECRET_PARAMS: &[&str] = &["key", "api_key", "access_token"];

/// Replace credential query values with `REDACTED`, for error and log text.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.split('?').next().unwrap_or_default().to_string();
    };
    if !url
        .query_pairs()
        .any(|(k, _)| SECRET_PARAMS.contains(&k.as_ref()))
    {
        return raw.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(&k.as_ref()) {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

/// A fully-read response. Non-2xx statuses are not errors at this layer;
/// callers classify them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface used by enumerators, metadata providers and
/// transcript strategies.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError>;

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<FetchedPage, FetchError>;
}

/// Settings for building an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    /// Fixed pause after every request, on top of adaptive spacing.
    pub request_delay: Duration,
    pub user_agent: Option<String>,
    /// `Accept-Language` sent with page requests, so display strings parse.
    pub accept_language: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            request_delay: Duration::from_millis(250),
            user_agent: None,
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    rate_limiter: RateLimiter,
    authenticated: bool,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings, rate_limiter: RateLimiter) -> Result<Self, FetchError> {
        let client = Self::builder(settings)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            request_delay: settings.request_delay,
            rate_limiter,
            authenticated: false,
        })
    }

    /// Build a client that sends the session cookies from `cookie_file`.
    pub fn with_cookie_file(
        settings: &HttpSettings,
        rate_limiter: RateLimiter,
        cookie_file: &Path,
    ) -> Result<Self, FetchError> {
        let jar = load_cookie_jar(cookie_file).map_err(|e| FetchError::Client(e.to_string()))?;
        let client = Self::builder(settings)
            .cookie_provider(jar)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            request_delay: settings.request_delay,
            rate_limiter,
            authenticated: true,
        })
    }

    fn builder(settings: &HttpSettings) -> reqwest::ClientBuilder {
        let user_agent = resolve_user_agent(settings.user_agent.as_deref());
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&settings.accept_language) {
            headers.insert(reqwest::header::ACCEPT_LANGUAGE, value);
        }
        Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(settings.timeout)
            .gzip(true)
            .brotli(true)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Underlying reqwest client, for requests the [`Fetch`] surface does
    /// not cover (multipart uploads).
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn execute(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<FetchedPage, FetchError> {
        let host = self.rate_limiter.acquire(url).await;

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status().as_u16();
        debug!("{} -> HTTP {}", redact_url(url), status);

        if let Some(host) = &host {
            self.rate_limiter.report_status(host, status).await;
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        tokio::time::sleep(self.request_delay).await;

        Ok(FetchedPage { status, body })
    }
}

#[async_trait]
impl Fetch for HttpClient {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.execute(url, self.client.get(url)).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<FetchedPage, FetchError> {
        self.execute(url, self.client.post(url).json(body)).await
    }
}
