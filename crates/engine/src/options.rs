// ABOUTME: Configuration for the extraction engine: Options plus the fluent OrchestratorBuilder.
// ABOUTME: Covers HTTP identity, remote service endpoints and the crawl wait policy.

use std::collections::HashMap;
use std::time::Duration;

use crate::orchestrator::Orchestrator;

/// Browser identity sent with every direct page fetch.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const DEFAULT_CRAWL_BASE_URL: &str = "https://api.firecrawl.dev/v1";
pub const DEFAULT_READER_BASE_URL: &str = "https://r.jina.ai";
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://api.scrapegraphai.com/v1";

/// How long and how often a submit-and-wait crawl polls for a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first poll. Doubles after every non-terminal poll.
    pub interval: Duration,
    /// Upper bound for the doubled delay.
    pub max_interval: Duration,
    /// Maximum number of status requests.
    pub max_polls: u32,
    /// Wall-clock deadline for the whole wait, measured from the first poll.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            max_polls: 120,
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    /// Delay to wait before poll number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Configuration options for the orchestrator and its backends.
#[derive(Debug, Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
    pub crawl_base_url: String,
    pub reader_base_url: String,
    pub graph_base_url: String,
    pub poll: PollPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: BROWSER_USER_AGENT.to_string(),
            allow_private_networks: false,
            http_client: None,
            headers: HashMap::new(),
            crawl_base_url: DEFAULT_CRAWL_BASE_URL.to_string(),
            reader_base_url: DEFAULT_READER_BASE_URL.to_string(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            poll: PollPolicy::default(),
        }
    }
}

/// Builder for constructing Orchestrator instances with custom configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorBuilder {
    opts: Options,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Override the User-Agent header sent on direct fetches.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow direct fetches against private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client (shared connection pool).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a header to direct page fetches.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    pub fn crawl_base_url(mut self, url: impl Into<String>) -> Self {
        self.opts.crawl_base_url = url.into();
        self
    }

    pub fn reader_base_url(mut self, url: impl Into<String>) -> Self {
        self.opts.reader_base_url = url.into();
        self
    }

    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.opts.graph_base_url = url.into();
        self
    }

    /// Replace the crawl wait policy.
    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.opts.poll = poll;
        self
    }

    /// Set the initial delay between crawl status polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.opts.poll.interval = interval;
        self
    }

    /// Cap the doubled delay between crawl status polls.
    pub fn max_poll_interval(mut self, interval: Duration) -> Self {
        self.opts.poll.max_interval = interval;
        self
    }

    /// Set the maximum number of crawl status polls.
    pub fn max_polls(mut self, max_polls: u32) -> Self {
        self.opts.poll.max_polls = max_polls;
        self
    }

    /// Set the wall-clock deadline for submit-and-wait crawls.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.opts.poll.timeout = timeout;
        self
    }

    /// Build the Orchestrator with the configured options.
    pub fn build(self) -> Result<Orchestrator, crate::error::ExtractError> {
        Orchestrator::new(self.opts)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
