//! Page and image fetching with retries, jittered pacing, UA rotation and proxies.
//!
//! - [`FetchPolicy`]: immutable knobs, built once and shared by every request
//! - [`HttpClient::get_text`]: page markup, retried on network errors, 429 and 5xx
//! - [`HttpClient::get_bytes`]: raw image bytes, single attempt
//!
//! Example (no_run):
//! ```rust,no_run
//! # async fn demo() -> Result<(), keeper_http::HttpError> {
//! let client = keeper_http::HttpClient::new(keeper_http::FetchPolicy::default())?;
//! let html = client.get_text("https://mp.weixin.qq.com/s/abc").await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! retries, final errors and a truncated body snippet (at `trace`). Proxy
//! addresses are logged without credentials.

mod agents;

pub use agents::{DEFAULT_USER_AGENT, UserAgentPool, parse_proxy_list};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Proxy, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const SNIPPET_LEN: usize = 500;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("client build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status} for {url}")]
    Status { status: StatusCode, url: String },
}

impl HttpError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Network(_) => true,
            HttpError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            HttpError::Url(_) | HttpError::Build(_) => false,
        }
    }
}

/// Request pacing and identity settings.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts per page request (at least one is always made).
    pub attempts: usize,
    pub page_timeout: Duration,
    pub asset_timeout: Duration,
    /// Pause before every page request.
    pub base_delay: Duration,
    /// Add 0.5–2.0 s of jitter to `base_delay`.
    pub random_delay: bool,
    /// First retry waits this long; each further retry doubles it.
    pub retry_backoff: Duration,
    pub rotate_user_agent: bool,
    pub use_proxy: bool,
    /// `host:port` entries, used as `http://host:port` for both schemes.
    pub proxies: Vec<String>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            page_timeout: Duration::from_secs(15),
            asset_timeout: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
            random_delay: true,
            retry_backoff: Duration::from_secs(1),
            rotate_user_agent: true,
            use_proxy: false,
            proxies: Vec::new(),
        }
    }
}

impl FetchPolicy {
    /// No pacing, no retries beyond `attempts`, fast backoff. Handy for tests and local mirrors.
    ///
    /// ```
    /// use keeper_http::FetchPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = FetchPolicy::immediate();
    /// assert_eq!(policy.base_delay, Duration::ZERO);
    /// assert!(!policy.random_delay);
    /// ```
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            random_delay: false,
            retry_backoff: Duration::from_millis(10),
            ..Self::default()
        }
    }

    fn backoff(&self, retry: usize) -> Duration {
        let factor = 1u32 << retry.min(16) as u32;
        self.retry_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// One `reqwest` client per route: direct, plus one per configured proxy.
#[derive(Clone)]
struct Route {
    label: String,
    client: Client,
}

#[derive(Clone)]
pub struct HttpClient {
    policy: FetchPolicy,
    agents: UserAgentPool,
    direct: Route,
    proxied: Vec<Route>,
}

impl HttpClient {
    pub fn new(policy: FetchPolicy) -> Result<Self, HttpError> {
        let direct = Route {
            label: "direct".into(),
            client: build_client(None)?,
        };

        let mut proxied = Vec::new();
        if policy.use_proxy {
            for addr in &policy.proxies {
                let proxy = Proxy::all(format!("http://{addr}"))
                    .map_err(|e| HttpError::Build(format!("proxy {}: {e}", redact_proxy(addr))))?;
                proxied.push(Route {
                    label: redact_proxy(addr),
                    client: build_client(Some(proxy))?,
                });
            }
        }

        Ok(Self {
            agents: UserAgentPool::new(policy.rotate_user_agent),
            policy,
            direct,
            proxied,
        })
    }

    /// Fetch page markup as text.
    ///
    /// The body is decoded as UTF-8 whatever charset the server declares.
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let url = parse_url(url)?;
        self.pace().await;

        let user_agent = self.agents.pick();
        tracing::debug!(%user_agent, "http.user_agent");
        let headers = page_headers(user_agent);

        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self
                .send(&url, headers.clone(), self.policy.page_timeout, attempt, attempts)
                .await
            {
                Ok(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.policy.backoff(attempt - 1);
                    tracing::warn!(
                        attempt,
                        attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "http.retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(attempt, attempts, error = %err, "http.error");
                    return Err(err);
                }
            }
        }
    }

    /// Fetch a binary asset in a single attempt.
    ///
    /// `referer` is sent as-is; image hosts commonly refuse hotlinked requests without one.
    pub async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, HttpError> {
        let url = parse_url(url)?;
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        if let Some(referer) = referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| HttpError::Build(format!("invalid referer: {e}")))?;
            headers.insert(header::REFERER, value);
        }
        self.send(&url, headers, self.policy.asset_timeout, 1, 1)
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "http.asset_error"))
    }

    async fn pace(&self) {
        let mut delay = self.policy.base_delay;
        if self.policy.random_delay {
            delay += Duration::from_secs_f64(agents::jitter_secs());
        }
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "http.pacing");
            sleep(delay).await;
        }
    }

    fn route(&self) -> &Route {
        if !self.policy.use_proxy {
            return &self.direct;
        }
        match agents::random_index(self.proxied.len()) {
            Some(idx) => &self.proxied[idx],
            None => {
                tracing::warn!("http.proxy.empty_pool_using_direct");
                &self.direct
            }
        }
    }

    async fn send(
        &self,
        url: &Url,
        headers: HeaderMap,
        timeout: Duration,
        attempt: usize,
        attempts: usize,
    ) -> Result<Vec<u8>, HttpError> {
        let route = self.route();
        tracing::debug!(
            attempt,
            attempts,
            route = %route.label,
            host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            timeout_ms = timeout.as_millis() as u64,
            "http.request.start"
        );

        let t0 = std::time::Instant::now();
        let resp = route
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        tracing::debug!(
            %status,
            duration_ms = t0.elapsed().as_millis() as u64,
            body_len = bytes.len(),
            "http.response"
        );
        tracing::trace!(body_snippet = %snip_body(&bytes), "http.response.body_snippet");

        if !status.is_success() {
            return Err(HttpError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(bytes.to_vec())
    }
}

fn build_client(proxy: Option<Proxy>) -> Result<Client, HttpError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::limited(5));
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| HttpError::Build(e.to_string()))
}

fn parse_url(raw: &str) -> Result<Url, HttpError> {
    Url::parse(raw).map_err(|e| HttpError::Url(format!("{raw}: {e}")))
}

fn page_headers(user_agent: &'static str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::USER_AGENT, HeaderValue::from_static(user_agent));
    h.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    h.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6"),
    );
    h.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    h.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    h.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    h.insert("sec-fetch-site", HeaderValue::from_static("none"));
    h.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    h
}

/// Drop any `user:pass@` prefix before a proxy address reaches the logs.
fn redact_proxy(addr: &str) -> String {
    match addr.rsplit_once('@') {
        Some((_, host)) => format!("<redacted>@{host}"),
        None => addr.to_string(),
    }
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_LEN {
        let mut cut = SNIPPET_LEN;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}
