//! Shared HTTP fetch layer (C2). One `FetchClient` per configured source,
//! constructed from that source's `SourceConfig` — rate limiter, proxy
//! list, TLS policy and default headers are properties of the client
//! object, matching spec.md §9 ("shared HTTP middleware as a struct with
//! policies", not globals).

use reqwest::{Client, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::proxy::{mask_proxy_url, ContentShape, ProxyRotator};
use super::rate_limiter::RateLimiter;
use crate::error::FetchError;

pub struct FetchResponse {
    pub status: u16,
    pub bytes: Vec<u8>,
}

pub struct FetchClient {
    source_name: String,
    client: Client,
    rate_limiter: RateLimiter,
    proxy: ProxyRotator,
}

impl FetchClient {
    pub fn new(
        source_name: impl Into<String>,
        timeout: Duration,
        min_request_interval: Option<Duration>,
        throttle_cooldown: Duration,
        proxies: Vec<String>,
        user_agent: Option<String>,
        insecure_tls: bool,
    ) -> Self {
        let mut builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4);

        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        if insecure_tls {
            // Environment-gated escape hatch for networks with MITM
            // interception during scraping (spec.md §4.2).
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().unwrap_or_default();
        let rate_limiter = match min_request_interval {
            Some(interval) => RateLimiter::new(interval, throttle_cooldown),
            None => RateLimiter::unlimited(),
        };

        Self {
            source_name: source_name.into(),
            client,
            rate_limiter,
            proxy: ProxyRotator::new(proxies),
        }
    }

    /// Execute one request, honoring the rate limiter, proxy rotation and
    /// cancellation. `expected_shape` is used both to validate a direct
    /// response and, when a proxy list is configured, to pick the first
    /// proxy whose response actually looks right.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        expected_shape: ContentShape,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        self.rate_limiter.acquire(cancel).await?;

        if !self.proxy.is_empty() {
            if let Some(response) = self.try_proxies(&method, url, expected_shape, cancel).await? {
                return Ok(response);
            }
            warn!(source = %self.source_name, "all proxies failed, falling back to direct connection");
        }

        self.send(&method, url, None, expected_shape, cancel).await
    }

    /// POST a JSON body with no proxy rotation — used for auth/session
    /// endpoints where the client has no content-shape to sniff across
    /// proxies and a session token ties subsequent calls to whichever
    /// origin issued it.
    pub async fn fetch_json_post(
        &self,
        url: &str,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        self.rate_limiter.acquire(cancel).await?;
        let request = self.client.post(url).json(body).build().map_err(FetchError::Transport)?;
        self.execute(request, cancel).await
    }

    /// GET with a bearer token attached — used for session-authenticated
    /// sources (spec.md §6 `api-key`/session patterns).
    pub async fn fetch_authorized(
        &self,
        method: Method,
        url: &str,
        token: &str,
        expected_shape: ContentShape,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        self.rate_limiter.acquire(cancel).await?;
        let request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .build()
            .map_err(FetchError::Transport)?;
        let response = self.execute(request, cancel).await?;
        if !expected_shape.matches(&response.bytes) {
            return Err(FetchError::Blocked);
        }
        Ok(response)
    }

    async fn execute(&self, request: reqwest::Request, cancel: &CancellationToken) -> Result<FetchResponse, FetchError> {
        let send_fut = self.client.execute(request);
        let response = tokio::select! {
            result = send_fut => result.map_err(FetchError::Transport)?,
            _ = cancel.cancelled() => return Err(FetchError::Canceled),
        };

        let status = response.status();
        if status.as_u16() == 429 {
            self.rate_limiter.record_throttled().await;
            return Err(FetchError::Throttled);
        }
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body_fut = response.bytes();
        let bytes = tokio::select! {
            result = body_fut => result.map_err(FetchError::Transport)?,
            _ = cancel.cancelled() => return Err(FetchError::Canceled),
        };

        Ok(FetchResponse { status: status.as_u16(), bytes: bytes.to_vec() })
    }

    async fn try_proxies(
        &self,
        method: &Method,
        url: &str,
        expected_shape: ContentShape,
        cancel: &CancellationToken,
    ) -> Result<Option<FetchResponse>, FetchError> {
        for index in self.proxy.rotation_order() {
            let proxy_url = self.proxy.url(index);
            debug!(source = %self.source_name, proxy = %mask_proxy_url(proxy_url), "trying proxy");

            match self.send(method, url, Some(proxy_url), expected_shape, cancel).await {
                Ok(response) => {
                    self.proxy.mark_good(index);
                    info!(source = %self.source_name, proxy = %mask_proxy_url(proxy_url), "proxy succeeded");
                    return Ok(Some(response));
                }
                Err(FetchError::Blocked) => {
                    debug!(source = %self.source_name, proxy = %mask_proxy_url(proxy_url), "proxy returned unexpected content shape");
                }
                Err(FetchError::Canceled) => return Err(FetchError::Canceled),
                Err(e) => {
                    debug!(source = %self.source_name, proxy = %mask_proxy_url(proxy_url), error = %e, "proxy attempt failed");
                }
            }
        }
        Ok(None)
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        proxy_url: Option<&str>,
        expected_shape: ContentShape,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let client = match proxy_url {
            Some(p) => {
                let proxy = reqwest::Proxy::all(p).map_err(FetchError::Transport)?;
                Client::builder().proxy(proxy).build().map_err(FetchError::Transport)?
            }
            None => self.client.clone(),
        };

        let request = client.request(method.clone(), url).build().map_err(FetchError::Transport)?;

        let send_fut = client.execute(request);
        let response = tokio::select! {
            result = send_fut => result.map_err(FetchError::Transport)?,
            _ = cancel.cancelled() => return Err(FetchError::Canceled),
        };

        let status = response.status();

        if status.as_u16() == 429 {
            self.rate_limiter.record_throttled().await;
            warn!(source = %self.source_name, "received HTTP 429, cooldown applied");
            return Err(FetchError::Throttled);
        }
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        // reqwest's `gzip` feature transparently decodes gzip-encoded
        // bodies when Content-Encoding so indicates; `bytes()` here
        // already yields the decoded payload.
        let body_fut = response.bytes();
        let bytes = tokio::select! {
            result = body_fut => result.map_err(FetchError::Transport)?,
            _ = cancel.cancelled() => return Err(FetchError::Canceled),
        };

        if !expected_shape.matches(&bytes) {
            return Err(FetchError::Blocked);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_client_constructs_without_interval() {
        let client = FetchClient::new(
            "test",
            Duration::from_secs(5),
            None,
            Duration::from_secs(3),
            vec![],
            None,
            false,
        );
        assert_eq!(client.source_name, "test");
    }
}
