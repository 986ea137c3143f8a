//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured User-Agent
//! - GET requests with a Referer header and a single manual redirect hop
//! - HEAD requests capturing the status code stored with each page
//! - The randomized politeness delay taken before every fetch

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::LemmascopeError;
use rand::Rng;
use reqwest::header::{LOCATION, REFERER, USER_AGENT};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after at most one redirect
    pub url: Url,
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are never followed by the client itself; [`Fetcher::fetch`]
/// follows at most one.
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.user_agent_or_default())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues crawl requests with the configured politeness headers
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    user_agent: String,
    referrer: String,
}

impl Fetcher {
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(crawler, user_agent)?,
            user_agent: user_agent.user_agent_or_default().to_string(),
            referrer: user_agent.referrer_or_default().to_string(),
        })
    }

    async fn get(&self, url: &Url) -> Result<Response, LemmascopeError> {
        self.client
            .get(url.as_str())
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, &self.referrer)
            .send()
            .await
            .map_err(|source| LemmascopeError::Http {
                url: url.to_string(),
                source,
            })
    }

    /// Fetches a page body
    ///
    /// # Request Flow
    ///
    /// 1. Send GET request
    /// 2. On 301/302, resolve the Location header and send one more GET
    /// 3. Accept only a 2xx final status
    ///
    /// # Errors
    ///
    /// * `FetchFailure` - Non-2xx final status, a second redirect, or a
    ///   redirect without a usable Location header
    /// * `Http` - Network failure
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, LemmascopeError> {
        let mut response = self.get(url).await?;
        let mut final_url = url.clone();

        if matches!(
            response.status(),
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
        ) {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| url.join(v).ok())
                .ok_or_else(|| LemmascopeError::FetchFailure {
                    url: url.to_string(),
                    reason: format!("HTTP {} without a Location header", response.status().as_u16()),
                })?;

            tracing::debug!("Following redirect {} -> {}", url, location);
            response = self.get(&location).await?;
            final_url = location;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(LemmascopeError::FetchFailure {
                url: final_url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response.text().await.map_err(|source| LemmascopeError::Http {
            url: final_url.to_string(),
            source,
        })?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }

    /// Returns the status of a HEAD request, or 0 if the request failed
    pub async fn head_status(&self, url: &Url) -> u16 {
        match self
            .client
            .head(url.as_str())
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, &self.referrer)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                tracing::debug!("HEAD {} failed: {}", url, e);
                0
            }
        }
    }
}

/// Sleeps for a random interval in `[min_ms, max_ms]`
pub async fn politeness_delay(min_ms: u64, max_ms: u64) {
    let millis = if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}
