//! HTTP fetching with "redirect means missing" classification.
//!
//! The catalog never answers 404 for a deleted book: it redirects to a
//! generic page instead. Automatic redirects are therefore disabled, and any
//! 3xx answer is reported as [`FetchOutcome::NotFound`] no matter where it
//! points.

use crate::config::SiteConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, header::LOCATION, redirect::Policy};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Why a resource is considered absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Absence {
    /// The server answered with a 4xx or 5xx status.
    Status(u16),
    /// The server redirected elsewhere.
    Redirected {
        status: u16,
        location: Option<String>,
    },
    /// The request could not even be built (bad URL and the like).
    InvalidRequest(String),
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Absence::Status(code) => write!(f, "HTTP {}", code),
            Absence::Redirected {
                status,
                location: Some(location),
            } => write!(f, "redirected ({}) to {}", status, location),
            Absence::Redirected { status, .. } => write!(f, "redirected ({})", status),
            Absence::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// The body of a non-redirected 2xx response.
    Success(T),
    /// Permanent: the resource does not exist. Never retried.
    NotFound(Absence),
    /// Connection-level failure (DNS, timeout, reset, TLS). Retryable.
    TransientFailure(String),
}

/// Source of pages and assets for the crawler.
///
/// `query` pairs are appended to the URL's query string.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a text resource, decoded with the charset the server declares.
    async fn fetch_text(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<String>;

    /// Fetches a binary resource byte-for-byte.
    async fn fetch_bytes(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<Vec<u8>>;
}

/// Builds the HTTP client used against the catalog site.
pub fn create_http_client(site: &SiteConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(site.user_agent.as_str())
        .redirect(Policy::none())
        .danger_accept_invalid_certs(site.insecure_tls)
        .timeout(site.request_timeout())
        .build()
}

/// Applies rate limiting delay.
pub async fn rate_limit(delay_sec: f64) {
    if delay_sec > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(delay_sec)).await;
    }
}

/// Appends query pairs to a URL.
pub fn with_query(url: &Url, query: &[(&str, String)]) -> Url {
    let mut url = url.clone();
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    url
}

/// [`Fetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
    delay_between_requests_sec: f64,
}

impl HttpFetcher {
    /// Creates a fetcher from site settings.
    pub fn new(site: &SiteConfig, delay_between_requests_sec: f64) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(
            create_http_client(site)?,
            delay_between_requests_sec,
        ))
    }

    /// Creates a fetcher around an existing client.
    ///
    /// The client must not follow redirects, or missing books will look
    /// like successful fetches of the fallback page.
    pub fn with_client(client: Client, delay_between_requests_sec: f64) -> Self {
        Self {
            client,
            delay_between_requests_sec,
        }
    }

    async fn send(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<Response> {
        rate_limit(self.delay_between_requests_sec).await;

        let target = with_query(url, query);
        tracing::debug!(url = %target, "GET");

        match self.client.get(target).send().await {
            Ok(response) => classify_response(response),
            Err(e) => classify_error(&e),
        }
    }
}

/// Classifies a received response by status line alone.
fn classify_response(response: Response) -> FetchOutcome<Response> {
    let status = response.status();

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        return FetchOutcome::NotFound(Absence::Redirected {
            status: status.as_u16(),
            location,
        });
    }

    if !status.is_success() {
        return FetchOutcome::NotFound(Absence::Status(status.as_u16()));
    }

    FetchOutcome::Success(response)
}

/// Classifies a failure to obtain a response at all.
fn classify_error(error: &reqwest::Error) -> FetchOutcome<Response> {
    if error.is_builder() {
        return FetchOutcome::NotFound(Absence::InvalidRequest(error.to_string()));
    }
    if let Some(status) = error.status() {
        return FetchOutcome::NotFound(Absence::Status(status.as_u16()));
    }
    FetchOutcome::TransientFailure(describe_error(error))
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<String> {
        match self.send(url, query).await {
            FetchOutcome::Success(response) => match response.text().await {
                Ok(text) => FetchOutcome::Success(text),
                Err(e) => FetchOutcome::TransientFailure(format!("body interrupted: {}", e)),
            },
            FetchOutcome::NotFound(absence) => FetchOutcome::NotFound(absence),
            FetchOutcome::TransientFailure(cause) => FetchOutcome::TransientFailure(cause),
        }
    }

    async fn fetch_bytes(&self, url: &Url, query: &[(&str, String)]) -> FetchOutcome<Vec<u8>> {
        match self.send(url, query).await {
            FetchOutcome::Success(response) => match response.bytes().await {
                Ok(bytes) => FetchOutcome::Success(bytes.to_vec()),
                Err(e) => FetchOutcome::TransientFailure(format!("body interrupted: {}", e)),
            },
            FetchOutcome::NotFound(absence) => FetchOutcome::NotFound(absence),
            FetchOutcome::TransientFailure(cause) => FetchOutcome::TransientFailure(cause),
        }
    }
}
