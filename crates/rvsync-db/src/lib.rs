//! # rvsync-db
//!
//! PostgreSQL catalog layer for rvsync.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgCatalogRepository`], the PostgreSQL implementation of
//!   [`rvsync_core::CatalogRepository`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use rvsync_db::{Database, PoolConfig};
//! use rvsync_core::CatalogRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/catalog", &PoolConfig::from_env()?).await?;
//!     let ports = db.catalog.list_ports().await?;
//!     println!("{} ports catalogued", ports.len());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod pool;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

pub use catalog::PgCatalogRepository;
pub use pool::{create_pool, log_pool_metrics, PoolConfig};

use rvsync_core::Result;

/// Catalog database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Repository over `cruise_info`, `pi_info` and `port_info`.
    pub catalog: PgCatalogRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            catalog: PgCatalogRepository::new(pool.clone()),
            pool,
        }
    }

    /// Open a pool and wrap it.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = create_pool(database_url, config).await?;
        Ok(Self::new(pool))
    }
}
