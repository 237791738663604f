//! HTTP client for source pages and asset streams.
//!
//! Every outbound request carries a client identity rotated from a fixed
//! pool, so repeated acquisition runs do not present a single fingerprint to
//! the source site.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::USER_AGENT;
use tracing::debug;

use chordsync_shared::{ChordsyncError, Result};

/// Identity pool rotated across outbound requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
];

/// Timeout for full-page requests.
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with per-request rotated identity.
///
/// `get` fetches a page body as text; `get_stream` opens a streaming response
/// for asset downloads under a shorter, configurable timeout.
pub struct SourceClient {
    client: Client,
    next_agent: AtomicUsize,
    asset_timeout: Duration,
}

impl SourceClient {
    /// Create a new client. `asset_timeout` bounds each asset download.
    pub fn new(asset_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(PAGE_TIMEOUT)
            .build()
            .map_err(|e| ChordsyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            next_agent: AtomicUsize::new(0),
            asset_timeout,
        })
    }

    /// Next identity from the pool, round-robin.
    fn user_agent(&self) -> &'static str {
        let i = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[i % USER_AGENTS.len()]
    }

    /// Fetch a page body as text. Non-success statuses are errors.
    pub async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .send()
            .await
            .map_err(|e| ChordsyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChordsyncError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ChordsyncError::Network(format!("{url}: body read failed: {e}")))
    }

    /// Open a streaming response for an asset download.
    ///
    /// The asset timeout covers the whole transfer, including body reads.
    /// Callers take the declared size from `content_length()` and the body
    /// from `bytes_stream()`.
    pub async fn get_stream(&self, url: &str) -> Result<reqwest::Response> {
        debug!(%url, "opening asset stream");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .timeout(self.asset_timeout)
            .send()
            .await
            .map_err(|e| ChordsyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChordsyncError::Network(format!("{url}: HTTP {status}")));
        }

        Ok(response)
    }
}
