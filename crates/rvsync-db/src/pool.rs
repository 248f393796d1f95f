//! Catalog connection pool.
//!
//! A run reads the snapshot and then writes its batches one stage at a time,
//! so the pool stays small. Sizing and the acquire timeout come from
//! `RVSYNC_DB_MAX_CONNECTIONS` and `RVSYNC_DB_CONNECT_TIMEOUT_SECS`.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use rvsync_core::{Error, Result};
use rvsync_core::logging::subsystem;

/// Default maximum number of catalog connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default time to wait for a connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Catalog pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long to wait for a connection before failing the run.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Pool settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Pool settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(n) = lookup("RVSYNC_DB_MAX_CONNECTIONS") {
            config.max_connections = parse_setting(&n, "RVSYNC_DB_MAX_CONNECTIONS")?;
        }
        if let Some(secs) = lookup("RVSYNC_DB_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout =
                Duration::from_secs(parse_setting(&secs, "RVSYNC_DB_CONNECT_TIMEOUT_SECS")?);
        }

        if config.max_connections == 0 {
            return Err(Error::Config(
                "RVSYNC_DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        config.min_connections = config.min_connections.min(config.max_connections);
        Ok(config)
    }
}

fn parse_setting<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
}

/// Open the catalog pool.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = subsystem::CATALOG,
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Creating catalog connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = subsystem::CATALOG,
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Catalog connection pool established"
    );
    Ok(pool)
}

/// Log pool usage at the end of a run.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = subsystem::CATALOG,
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = subsystem::CATALOG,
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = PoolConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_environment_overrides() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("RVSYNC_DB_MAX_CONNECTIONS", "2"),
            ("RVSYNC_DB_CONNECT_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(PoolConfig::from_lookup(lookup(&[("RVSYNC_DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(PoolConfig::from_lookup(lookup(&[("RVSYNC_DB_MAX_CONNECTIONS", "many")])).is_err());
        assert!(
            PoolConfig::from_lookup(lookup(&[("RVSYNC_DB_CONNECT_TIMEOUT_SECS", "-1")])).is_err()
        );
    }
}
