//! Peer client configuration.
//!
//! Points the consumer at one provider. Defaults target a provider on the
//! local machine; override via environment variables or explicit
//! construction.

use url::Url;

/// Default provider base URL.
pub const DEFAULT_PEER_URL: &str = "http://localhost:8080";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the provider lives and how long a single call may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Base URL of the provider. Route paths (`/v1/...`) are appended.
    pub base_url: Url,
    /// Request timeout in seconds, applied to every call.
    pub timeout_secs: u64,
}

impl PeerConfig {
    pub fn new(base_url: &str) -> Result<Self, PeerConfigError> {
        Ok(Self {
            base_url: parse_url("base_url", base_url)?,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DSC_PEER_URL` (default: `http://localhost:8080`)
    /// - `DSC_PEER_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, PeerConfigError> {
        let raw = std::env::var("DSC_PEER_URL").unwrap_or_else(|_| DEFAULT_PEER_URL.to_string());
        let timeout_secs = match std::env::var("DSC_PEER_TIMEOUT_SECS") {
            Ok(value) => value
                .parse()
                .map_err(|_| PeerConfigError::InvalidTimeout(value))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            base_url: parse_url("DSC_PEER_URL", &raw)?,
            timeout_secs,
        })
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, PeerConfigError> {
    let url = Url::parse(raw).map_err(|e| PeerConfigError::InvalidUrl(var.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(PeerConfigError::InvalidUrl(
            var.to_string(),
            "not a base URL".to_string(),
        ));
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum PeerConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("DSC_PEER_TIMEOUT_SECS must be a whole number of seconds, got {0:?}")]
    InvalidTimeout(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
