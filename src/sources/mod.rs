//! Upstream client and shared HTTP utilities for the Biolink REST API.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::error::BiolinkMcpError;

pub(crate) mod biolink;

const ERROR_BODY_MAX_BYTES: usize = 300;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Connection settings for the upstream HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra attempts after the first one for transient failures.
    pub max_retries: u32,
    pub retry_min_backoff: Duration,
    pub retry_max_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: biolink::BIOLINK_BASE.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_min_backoff: Duration::from_millis(750),
            retry_max_backoff: Duration::from_secs(10),
        }
    }
}

/// Builds an HTTP client with retry middleware for transient errors.
///
/// Connect failures, timeouts, 408, 429 and 5xx responses are retried with
/// exponential backoff. With `max_retries == 0` the middleware is skipped.
pub(crate) fn build_client(
    config: &ClientConfig,
) -> Result<ClientWithMiddleware, BiolinkMcpError> {
    let base_client = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(concat!("biolink-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(BiolinkMcpError::HttpClientInit)?;

    let mut builder = ClientBuilder::new(base_client);
    if config.max_retries > 0 {
        let min_backoff = config.retry_min_backoff.min(config.retry_max_backoff);
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(min_backoff, config.retry_max_backoff)
            .build_with_max_retries(config.max_retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
    }

    Ok(builder.build())
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    path: &str,
) -> Result<Vec<u8>, BiolinkMcpError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(BiolinkMcpError::Network(format!(
                "response body from {path} exceeded {DEFAULT_MAX_BODY_BYTES} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
