//! Core traits for rvsync abstractions.
//!
//! The pipeline only talks to the catalog and to the operator through these
//! traits, so the PostgreSQL repository and the console prompt can be swapped
//! for in-memory implementations in tests.

use async_trait::async_trait;

use crate::conflict::{ConflictCase, ConflictDecision};
use crate::error::Result;
use crate::models::*;

// =============================================================================
// CATALOG REPOSITORY
// =============================================================================

/// Read and write access to the catalog's `cruise_info`, `pi_info` and
/// `port_info` tables.
///
/// Write methods insert a whole batch atomically: either every row lands or
/// the batch is rolled back and the error returned.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// `(cruise_id, vessel)` pairs already catalogued for the given vessels.
    async fn list_cruise_keys(&self, vessels: &[String]) -> Result<Vec<(String, String)>>;

    /// Every PI row with the columns used for matching.
    async fn list_pis(&self) -> Result<Vec<CatalogPi>>;

    /// Distinct non-null `pi_institution` values.
    async fn list_institutions(&self) -> Result<Vec<String>>;

    /// Every port row with its display name and country.
    async fn list_ports(&self) -> Result<Vec<CatalogPort>>;

    /// Set the institution of the PI row(s) with this exact name.
    async fn update_pi_institution(&self, update: &InstitutionUpdate) -> Result<u64>;

    /// Insert PI rows in one transaction.
    async fn insert_pis(&self, rows: &[NewPi]) -> Result<u64>;

    /// Insert port rows in one transaction.
    async fn insert_ports(&self, rows: &[NewPort]) -> Result<u64>;

    /// Generated ids of PI rows with the given names.
    async fn pi_ids(&self, names: &[String]) -> Result<Vec<CatalogId>>;

    /// Generated ids of port rows with the given display names.
    async fn port_ids(&self, names: &[String]) -> Result<Vec<CatalogId>>;

    /// Insert cruise rows in one transaction.
    async fn insert_cruises(&self, rows: &[NewCruise]) -> Result<u64>;
}

// =============================================================================
// CONFLICT RESOLUTION
// =============================================================================

/// Supplies the operator's decision for an ambiguous PI name.
///
/// Called once per case, in order, before any insert is issued; the pipeline
/// waits for each answer before asking the next.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve(&self, case: &ConflictCase) -> Result<ConflictDecision>;
}
