//! Centralized default constants for rvsync.
//!
//! All crates and the CLI reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// REGISTRY
// =============================================================================

/// Base URL of the upstream R2R registry API.
pub const REGISTRY_URL: &str = "https://service.rvdata.us/api";

/// Maximum attempts per upstream request (first try included).
pub const MAX_RETRIES: u32 = 3;

/// Per-request timeout in seconds.
pub const API_TIMEOUT_SECS: u64 = 10;

/// Base delay for exponential backoff in milliseconds (1s, 2s, 4s, ...).
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Concurrent fetch tasks during acquisition.
pub const WORKER_POOL_SIZE: usize = 6;

// =============================================================================
// VESSELS
// =============================================================================

/// Default vessel table: registry short name → catalog canonical name.
pub const VESSELS: &[(&str, &str)] = &[
    ("Roger Revelle", "R/V ROGER REVELLE"),
    ("Robert Gordon Sproul", "R/V ROBERT GORDON SPROUL"),
    ("Sally Ride", "R/V SALLY RIDE"),
];

// =============================================================================
// MATCHING
// =============================================================================

/// Longest port-name suffix treated as a country code when deriving the
/// code → country expansion from the catalog.
pub const COUNTRY_CODE_MAX_LEN: usize = 4;

/// Longest second given-name token dropped as a trailing initial.
pub const INITIAL_MAX_LEN: usize = 2;

// =============================================================================
// DATABASE
// =============================================================================

/// Default catalog URL when DATABASE_URL is not set.
pub const DATABASE_URL: &str = "postgres://localhost/catalog";
