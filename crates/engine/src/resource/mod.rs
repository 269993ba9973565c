// ABOUTME: Fetcher: a single HTTP GET per call with a fixed browser identity and no retries.
// ABOUTME: Guards private networks (including across redirects) and caps the body size.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;

use crate::error::ExtractError;
use crate::options::{Options, BROWSER_USER_AGENT};

/// Maximum allowed body size (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "169.254.0.0/16",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Options for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            headers: HashMap::new(),
            allow_private_networks: false,
        }
    }
}

/// Raw response of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Check if an IP address is in a private/reserved range.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => PRIVATE_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => {
            if let Some(v4) = ip.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            ip.is_loopback() || ip.is_unspecified() || PRIVATE_V6.iter().any(|net| net.contains(ip))
        }
    }
}

/// Resolve `host` and report whether any of its addresses is private.
async fn resolves_to_private(host: &str, port: u16) -> std::io::Result<bool> {
    if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(is_private_ip(&ip));
    }
    let mut addrs = tokio::net::lookup_host((host, port)).await?;
    Ok(addrs.any(|sa| is_private_ip(&sa.ip())))
}

/// Report whether the host of `url` is, or resolves to, a private address.
async fn targets_private(url: &url::Url) -> std::io::Result<bool> {
    match url.host_str() {
        Some(host) => resolves_to_private(host, url.port_or_known_default().unwrap_or(80)).await,
        None => Ok(false),
    }
}

/// Reject a response whose final URL (after redirects) lands on a private address.
async fn check_final_url(requested: &str, final_url: &url::Url) -> Result<(), ExtractError> {
    let private = targets_private(final_url).await.map_err(|e| {
        ExtractError::fetch(
            requested,
            "Fetch",
            Some(anyhow::anyhow!("DNS lookup failed for {}: {}", final_url, e)),
        )
    })?;
    if private {
        return Err(ExtractError::fetch(
            requested,
            "Fetch",
            Some(anyhow::anyhow!(
                "redirect to private network address blocked: {}",
                final_url
            )),
        ));
    }
    Ok(())
}

/// Build the shared HTTP client used for direct fetches and remote backends.
///
/// Redirects to private IP literals are refused unless `allow_private_networks`
/// is set. Hostnames are checked by [`fetch`] once the response arrives.
pub fn build_http_client(opts: &Options) -> Result<reqwest::Client, ExtractError> {
    if let Some(ref client) = opts.http_client {
        return Ok(client.clone());
    }

    let allow_private = opts.allow_private_networks;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= 10 {
            return attempt.error("too many redirects");
        }
        if allow_private {
            return attempt.follow();
        }
        let blocked = match attempt.url().host() {
            Some(url::Host::Ipv4(ip)) => is_private_ip(&IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => is_private_ip(&IpAddr::V6(ip)),
            _ => false,
        };
        if blocked {
            return attempt.error("redirect to private IP blocked");
        }
        attempt.follow()
    });

    reqwest::Client::builder()
        .redirect(redirect_policy)
        .user_agent(&opts.user_agent)
        .timeout(opts.timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| {
            ExtractError::invalid_configuration(
                "",
                "BuildHttpClient",
                Some(anyhow::anyhow!("failed to build HTTP client: {}", e)),
            )
        })
}

/// Fetch a page. Any non-2xx status, transport error or timeout is a `FetchFailure`.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, ExtractError> {
    if url.is_empty() {
        return Err(ExtractError::invalid_request(
            url,
            "Fetch",
            Some(anyhow::anyhow!("empty URL")),
        ));
    }

    let parsed_url = url::Url::parse(url).map_err(|e| {
        ExtractError::invalid_request(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let scheme = parsed_url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ExtractError::invalid_request(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if !opts.allow_private_networks {
        let private = targets_private(&parsed_url).await.map_err(|e| {
            ExtractError::fetch(url, "Fetch", Some(anyhow::anyhow!("DNS lookup failed: {}", e)))
        })?;
        if private {
            return Err(ExtractError::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("private network addresses are not allowed")),
            ));
        }
    }

    let mut request = client
        .get(url)
        .header(reqwest::header::USER_AGENT, &opts.user_agent);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    tracing::debug!(url = %url, "fetching page");

    let response = request.send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            anyhow::anyhow!("request timed out: {}", e)
        } else {
            anyhow::anyhow!("request failed: {}", e)
        };
        ExtractError::fetch(url, "Fetch", Some(reason))
    })?;

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(ExtractError::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    if !opts.allow_private_networks && response.url() != &parsed_url {
        check_final_url(url, response.url()).await?;
    }

    let status = response.status();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    if !status.is_success() {
        return Err(ExtractError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("HTTP status {}", status.as_u16())),
        ));
    }

    let body = response.bytes().await.map_err(|e| {
        ExtractError::fetch(url, "Fetch", Some(anyhow::anyhow!("failed to read body: {}", e)))
    })?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(ExtractError::fetch(
            url,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    tracing::debug!(url = %url, status = status.as_u16(), bytes = body.len(), "page fetched");

    Ok(FetchResult {
        status: status.as_u16(),
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

/// A Fetcher bound to a shared client and fixed fetch options.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    opts: FetchOptions,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, opts: FetchOptions) -> Self {
        Self { client, opts }
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchResult, ExtractError> {
        fetch(&self.client, url, &self.opts).await
    }
}
