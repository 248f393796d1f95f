//! Run configuration.
//!
//! A [`SyncConfig`] is built once (from defaults, then environment, then CLI
//! overrides) and handed to the acquisition phase and the pipeline by
//! reference. Nothing reads configuration from global state after that.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | RVSYNC_REGISTRY_URL | https://service.rvdata.us/api | Registry base URL |
//! | RVSYNC_VESSELS | built-in table | `Short=Canonical;Short=Canonical` |
//! | RVSYNC_MAX_RETRIES | 3 | Attempts per upstream request |
//! | RVSYNC_API_TIMEOUT_SECS | 10 | Per-request timeout |
//! | RVSYNC_WORKERS | 6 | Concurrent fetch tasks |
//! | RVSYNC_READ_FAILURE | propagate | `propagate` or `empty` |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::Vessel;

/// What the pipeline does when a catalog read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadFailurePolicy {
    /// Abort the run with the storage error.
    #[default]
    Propagate,
    /// Log the error and continue as if the read returned no rows.
    Empty,
}

impl FromStr for ReadFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "propagate" | "abort" => Ok(Self::Propagate),
            "empty" | "treat-as-empty" => Ok(Self::Empty),
            other => Err(Error::Config(format!(
                "invalid read failure policy '{}', expected 'propagate' or 'empty'",
                other
            ))),
        }
    }
}

impl fmt::Display for ReadFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagate => write!(f, "propagate"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Retry contract for upstream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_RETRIES,
            base_delay: Duration::from_millis(defaults::BACKOFF_BASE_MS),
            timeout: Duration::from_secs(defaults::API_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Immutable configuration for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub vessels: Vec<Vessel>,
    pub registry_url: String,
    pub retry: RetryPolicy,
    pub worker_pool_size: usize,
    pub read_failure: ReadFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            vessels: defaults::VESSELS
                .iter()
                .map(|(short, canonical)| Vessel::new(*short, *canonical))
                .collect(),
            registry_url: defaults::REGISTRY_URL.to_string(),
            retry: RetryPolicy::default(),
            worker_pool_size: defaults::WORKER_POOL_SIZE,
            read_failure: ReadFailurePolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Load from `RVSYNC_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("RVSYNC_REGISTRY_URL") {
            config.registry_url = url.trim_end_matches('/').to_string();
        }
        if let Some(table) = lookup("RVSYNC_VESSELS") {
            config.vessels = parse_vessels(&table)?;
        }
        if let Some(n) = lookup("RVSYNC_MAX_RETRIES") {
            config.retry.max_attempts = parse_number(&n, "RVSYNC_MAX_RETRIES")?;
        }
        if let Some(secs) = lookup("RVSYNC_API_TIMEOUT_SECS") {
            config.retry.timeout = Duration::from_secs(parse_number(&secs, "RVSYNC_API_TIMEOUT_SECS")?);
        }
        if let Some(n) = lookup("RVSYNC_WORKERS") {
            config.worker_pool_size = parse_number(&n, "RVSYNC_WORKERS")?;
        }
        if let Some(policy) = lookup("RVSYNC_READ_FAILURE") {
            config.read_failure = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.vessels.is_empty() {
            return Err(Error::Config("at least one vessel is required".to_string()));
        }
        if !self.registry_url.starts_with("http://") && !self.registry_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "registry URL must start with http:// or https://, got: {}",
                self.registry_url
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("max retries must be at least 1".to_string()));
        }
        if self.worker_pool_size == 0 {
            return Err(Error::Config("worker pool size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Canonical names of all configured vessels.
    pub fn canonical_vessels(&self) -> Vec<String> {
        self.vessels.iter().map(|v| v.canonical_name.clone()).collect()
    }
}

fn parse_number<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
}

/// Parse a vessel table of the form `Short=Canonical;Short=Canonical`.
pub fn parse_vessels(table: &str) -> Result<Vec<Vessel>> {
    let mut vessels = Vec::new();
    for entry in table.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (short, canonical) = entry.split_once('=').ok_or_else(|| {
            Error::Config(format!("vessel entry '{}' is not Short=Canonical", entry))
        })?;
        let (short, canonical) = (short.trim(), canonical.trim());
        if short.is_empty() || canonical.is_empty() {
            return Err(Error::Config(format!("vessel entry '{}' has an empty name", entry)));
        }
        if vessels.iter().any(|v: &Vessel| v.short_name == short) {
            return Err(Error::Config(format!("vessel '{}' listed twice", short)));
        }
        if vessels.iter().any(|v: &Vessel| v.canonical_name == canonical) {
            return Err(Error::Config(format!(
                "vessel '{}' mapped from more than one short name",
                canonical
            )));
        }
        vessels.push(Vessel::new(short, canonical));
    }
    Ok(vessels)
}
