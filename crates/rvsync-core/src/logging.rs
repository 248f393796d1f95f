//! Structured logging field name constants for rvsync.
//!
//! All crates use these constants for consistent structured logging fields so
//! a run's log can be filtered by the same keys regardless of which subsystem
//! emitted the event.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Run aborted, or a catalog read failure masked by policy |
//! | WARN  | Upstream fetch degraded to an empty result, interrupt ignored |
//! | INFO  | Phase boundaries, insert batch completions, run summary |
//! | DEBUG | Match decisions, conflict decisions, retry attempts |
//! | TRACE | Per-record iteration (cruises, PIs, ports) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event. Values are in [`subsystem`].
pub const SUBSYSTEM: &str = "subsystem";

/// Values of the `subsystem` field.
pub mod subsystem {
    /// R2R registry client and phase-1 acquisition.
    pub const REGISTRY: &str = "registry";
    /// Catalog database access.
    pub const CATALOG: &str = "catalog";
    /// Snapshot, matching, planning and the pipeline.
    pub const RECONCILE: &str = "reconcile";
    /// The `rvsync` binary.
    pub const CLI: &str = "cli";
}

/// Component within a subsystem.
/// Examples: "client", "acquire", "matcher", "planner", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "fetch_cruises", "fetch_vocabulary", "insert_pis"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Vessel short name or canonical name.
pub const VESSEL: &str = "vessel";

/// External cruise identifier.
pub const CRUISE_ID: &str = "cruise_id";

/// PI name (raw or normalized).
pub const PI_NAME: &str = "pi_name";

/// Port display name.
pub const PORT_NAME: &str = "port_name";

/// Vocabulary type ("port", "person", "organization").
pub const VOCAB_TYPE: &str = "vocab_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or records affected or returned.
pub const RESULT_COUNT: &str = "result_count";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

/// Attempts allowed per registry request.
pub const MAX_ATTEMPTS: &str = "max_attempts";

/// Backoff before the next attempt, in milliseconds.
pub const WAIT_MS: &str = "wait_ms";

/// Connections currently open in the catalog pool.
pub const POOL_SIZE: &str = "pool_size";

// ─── Database fields ───────────────────────────────────────────────────────

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Conflict decision taken for an ambiguous PI.
pub const DECISION: &str = "decision";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
