//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the pooled HTTP client with explicit timeouts
//! - Rotating the User-Agent and setting the Referer on every request
//! - GET requests with bounded backoff on HTTP 429
//! - Claiming redirect targets so no URL is fetched twice in a session
//! - HEAD requests that gate links before they enter the frontier
//! - Randomized politeness delays
//!
//! Every network call and every sleep races the session cancellation token.

use crate::config::Config;
use crate::state::{SkipReason, VisitedSet};
use crate::url::normalize_url;
use rand::Rng;
use reqwest::header::{HeaderMap, LOCATION, REFERER, RETRY_AFTER, USER_AGENT};
use reqwest::{
    redirect::Policy, Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode,
};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maximum redirect hops followed by the client
const MAX_REDIRECTS: usize = 10;

/// Why a fetch produced no document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("redirect target {0} already visited")]
    RedirectVisited(Url),

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if this outcome should count against the failure-rate breaker
    ///
    /// Cancellation is the session stopping, and a redirect onto a visited
    /// URL is a healthy response; neither is the target misbehaving.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::RedirectVisited(_))
    }

    pub fn skip_reason(&self) -> SkipReason {
        match self {
            Self::Network(_) => SkipReason::Network,
            Self::Status(code) => SkipReason::HttpStatus(*code),
            Self::RateLimitExhausted { .. } => SkipReason::RateLimited,
            Self::Body(_) => SkipReason::Body,
            Self::RedirectVisited(_) => SkipReason::RedirectVisited,
            Self::Cancelled => SkipReason::Cancelled,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network("request timeout".to_string())
        } else if e.is_connect() {
            Self::Network("connection refused".to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// Page body as UTF-8 text
    pub body: String,
}

/// Builds the session HTTP client
///
/// The client carries no default User-Agent; one is picked per request.
///
/// # Arguments
///
/// * `config` - The full configuration (timeouts come from `[crawler]`)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    client_builder(config)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()
}

/// Builds the client used for page GETs
///
/// Every redirect hop is claimed in `visited` before it is followed. A hop
/// onto a URL the session already owns stops the chain, and the 3xx
/// response is returned as is.
fn build_page_client(config: &Config, visited: VisitedSet) -> Result<Client, reqwest::Error> {
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        // A hop that normalizes to a URL already in this chain is the same page
        let same_page = attempt
            .previous()
            .iter()
            .any(|previous| same_key(previous, attempt.url()));
        if same_page || visited.try_claim(attempt.url()) {
            attempt.follow()
        } else {
            attempt.stop()
        }
    });

    client_builder(config).redirect(policy).build()
}

fn client_builder(config: &Config) -> ClientBuilder {
    Client::builder()
        .timeout(config.crawler.per_request_timeout())
        .connect_timeout(config.crawler.connect_timeout())
        .gzip(true)
        .brotli(true)
}

fn same_key(a: &Url, b: &Url) -> bool {
    match (normalize_url(a.as_str()), normalize_url(b.as_str())) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Issues GET and HEAD requests on behalf of the crawl
///
/// Cloning is cheap: the connection pool and cancellation token are shared.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    page_client: Client,
    visited: VisitedSet,
    user_agents: Vec<String>,
    referer: Option<String>,
    max_retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    politeness_min_ms: u64,
    politeness_max_ms: u64,
    cancel: CancellationToken,
}

impl Fetcher {
    /// Creates a fetcher from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The full configuration
    /// * `referer` - Referer sent with every request (the seed URL when the config has none)
    /// * `visited` - Session visited set; redirect targets are claimed in it
    /// * `cancel` - Session cancellation token
    pub fn new(
        config: &Config,
        referer: Option<String>,
        visited: VisitedSet,
        cancel: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            page_client: build_page_client(config, visited.clone())?,
            visited,
            user_agents: config.user_agent.pool.clone(),
            referer: config.user_agent.referer.clone().or(referer),
            max_retries: config.crawler.max_retries_on_rate_limit,
            backoff_base: Duration::from_millis(config.crawler.backoff_base_ms),
            backoff_max: Duration::from_millis(config.crawler.backoff_max_ms),
            politeness_min_ms: config.crawler.politeness_delay_min_ms,
            politeness_max_ms: config.crawler.politeness_delay_max_ms,
            cancel,
        })
    }

    /// Fetches a page, retrying on HTTP 429 within the retry budget
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 | Read body as UTF-8 → success |
    /// | HTTP 429 | Back off and retry, at most `max-retries-on-rate-limit` times |
    /// | Redirect onto a visited URL | Immediate → `RedirectVisited` |
    /// | Other status | Immediate → `Status` |
    /// | Timeout / connect failure | Immediate → `Network` |
    /// | Session cancelled | Immediate → `Cancelled` |
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            let response = self
                .cancellable(self.page_request(url).send())
                .await??;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.max_retries {
                    tracing::warn!(url = %url, attempts = attempt + 1, "Rate limit retry budget exhausted");
                    return Err(FetchError::RateLimitExhausted {
                        attempts: attempt + 1,
                    });
                }

                let delay = retry_after(response.headers())
                    .map(|d| d.min(self.backoff_max))
                    .unwrap_or_else(|| backoff_delay(attempt, self.backoff_base, self.backoff_max));
                drop(response);
                attempt += 1;
                tracing::warn!(url = %url, attempt, "Rate limited, backing off {:?}", delay);
                self.sleep(delay).await?;
                continue;
            }

            if status.is_redirection() {
                if let Some(target) = self.visited_redirect_target(&response) {
                    tracing::debug!(url = %url, target = %target, "Redirect target already visited");
                    return Err(FetchError::RedirectVisited(target));
                }
            }

            if status != StatusCode::OK {
                tracing::debug!(url = %url, status = status.as_u16(), "Non-success status");
                return Err(FetchError::Status(status.as_u16()));
            }

            return self.read_page(response).await;
        }
    }

    /// Checks that a URL exists with a HEAD request
    ///
    /// Success iff the status is exactly 200. Network errors, other statuses,
    /// and cancellation are all folded into `false`.
    pub async fn validate(&self, url: &Url) -> bool {
        match self
            .cancellable(self.request(Method::HEAD, url).send())
            .await
        {
            Ok(Ok(response)) => response.status() == StatusCode::OK,
            Ok(Err(e)) => {
                tracing::trace!(url = %url, "Validation request failed: {}", e);
                false
            }
            Err(_) => false,
        }
    }

    /// Sleeps for a random duration within the politeness range
    pub async fn politeness_delay(&self) -> Result<(), FetchError> {
        let delay = if self.politeness_max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(
                rand::thread_rng().gen_range(self.politeness_min_ms..=self.politeness_max_ms),
            )
        };
        self.sleep(delay).await
    }

    /// Sleeps unless the session is cancelled first
    pub async fn sleep(&self, delay: Duration) -> Result<(), FetchError> {
        if delay.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(FetchError::Cancelled)
            } else {
                Ok(())
            };
        }
        self.cancellable(tokio::time::sleep(delay)).await
    }

    /// Returns a copy of this fetcher bound to another cancellation token
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn read_page(&self, response: Response) -> Result<FetchedPage, FetchError> {
        let final_url = response.url().clone();
        let bytes = self
            .cancellable(response.bytes())
            .await?
            .map_err(|e| FetchError::Body(e.to_string()))?;
        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| FetchError::Body(format!("invalid UTF-8: {}", e)))?;

        Ok(FetchedPage { final_url, body })
    }

    /// Target of a 3xx the page client declined to follow, if already visited
    fn visited_redirect_target(&self, response: &Response) -> Option<Url> {
        let location = response.headers().get(LOCATION)?.to_str().ok()?;
        let target = response.url().join(location).ok()?;
        self.visited.contains(&target).then_some(target)
    }

    fn page_request(&self, url: &Url) -> RequestBuilder {
        self.with_headers(self.page_client.get(url.clone()))
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.with_headers(self.client.request(method, url.clone()))
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.header(USER_AGENT, self.pick_user_agent());
        if let Some(referer) = &self.referer {
            builder = builder.header(REFERER, referer);
        }
        builder
    }

    fn pick_user_agent(&self) -> &str {
        if self.user_agents.is_empty() {
            return "";
        }
        let index = rand::thread_rng().gen_range(0..self.user_agents.len());
        &self.user_agents[index]
    }

    async fn cancellable<F, T>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            value = fut => Ok(value),
        }
    }
}

/// Exponential backoff with full jitter
///
/// Returns a random duration in `[0, min(base * 2^attempt, max)]`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    let ceiling = base.saturating_mul(factor).min(max);
    let ceiling_ms = ceiling.as_millis() as u64;
    if ceiling_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
}

/// Parses a numeric `Retry-After` header (seconds)
///
/// HTTP-date values are ignored and fall back to computed backoff.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
