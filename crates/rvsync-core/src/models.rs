//! Core data models for rvsync.
//!
//! These types are shared across all rvsync crates: upstream records as
//! fetched from the registry, catalog rows as read back from the database,
//! and the typed rows the planner hands to the catalog for insertion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::normalize::ParsedName;

// =============================================================================
// UPSTREAM TYPES
// =============================================================================

/// A vessel known both to the registry (by short name) and to the catalog
/// (by canonical name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vessel {
    /// Name used in registry queries, e.g. `"Sally Ride"`.
    pub short_name: String,
    /// Name stored in `cruise_info.vessel`, e.g. `"R/V SALLY RIDE"`.
    pub canonical_name: String,
}

impl Vessel {
    pub fn new(short_name: impl Into<String>, canonical_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            canonical_name: canonical_name.into(),
        }
    }
}

/// One cruise as reported by the upstream registry.
///
/// Fields are kept as the registry's text; empty means "not reported".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CruiseRecord {
    pub cruise_id: String,
    /// Canonical (catalog) vessel name.
    pub vessel: String,
    pub title: String,
    pub depart_date: String,
    pub arrive_date: String,
    pub chief_scientist: String,
    pub depart_port: String,
    pub arrive_port: String,
    pub operator_name: String,
    pub operator_id: String,
    pub latitude_min: String,
    pub latitude_max: String,
    pub longitude_min: String,
    pub longitude_max: String,
}

impl CruiseRecord {
    /// Identity key `(cruise_id, vessel)`.
    pub fn key(&self) -> (String, String) {
        (self.cruise_id.clone(), self.vessel.clone())
    }
}

/// A PI referenced by at least one missing cruise, with its institution
/// resolved through the vocabularies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub name: ParsedName,
    /// Institution text to store (catalog spelling when one already matches).
    pub institution: String,
    /// Registry person id, empty when unknown.
    pub r2r_id: String,
    /// Registry organization id, empty when unknown.
    pub r2r_institution: String,
}

/// A port referenced by at least one missing cruise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortCandidate {
    /// Country-qualified display name (catalog identity).
    pub display_name: String,
    /// Name as given upstream, used for vocabulary lookups.
    pub upstream_name: String,
}

// =============================================================================
// CATALOG TYPES
// =============================================================================

/// A row of `pi_info` as needed for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPi {
    pub id: i64,
    pub pi_name: String,
    pub pi_institution: Option<String>,
    pub pi_r2r_id: Option<String>,
}

/// A row of `port_info` as needed for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPort {
    pub port_name: String,
    pub port_country: Option<String>,
}

/// A generated id read back after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogId {
    pub id: i64,
    pub name: String,
}

// =============================================================================
// INSERT ROWS
// =============================================================================

/// A `pi_info` row to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPi {
    pub pi_name: String,
    pub first_name: String,
    pub last_name: String,
    pub institution: String,
    pub r2r_id: Option<i64>,
    pub r2r_institution: String,
}

/// A `port_info` row to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPort {
    pub port_name: String,
    pub r2r_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: String,
}

/// A `cruise_info` row to insert, foreign keys already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCruise {
    pub cruise_id: String,
    pub title: String,
    pub vessel: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pi_id: Option<i64>,
    pub pi_name: Option<String>,
    pub port_start_id: Option<i64>,
    pub port_end_id: Option<i64>,
    pub port_start: Option<String>,
    pub port_end: Option<String>,
    pub latitude_min: Option<f64>,
    pub latitude_max: Option<f64>,
    pub longitude_min: Option<f64>,
    pub longitude_max: Option<f64>,
    pub institution: String,
}

/// An in-place institution update authorized by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionUpdate {
    pub pi_name: String,
    pub institution: String,
}

// =============================================================================
// RUN SUMMARY
// =============================================================================

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Cruises fetched from the registry across all vessels.
    pub upstream_cruises: usize,
    /// Cruises absent from the catalog snapshot.
    pub missing_cruises: usize,
    /// PIs classified missing before conflict resolution.
    pub missing_pis: usize,
    /// Ports classified missing.
    pub missing_ports: usize,
    /// PIs mapped onto an existing row by the operator (bundle or merge).
    pub bundled_pis: usize,
    /// Existing PI rows whose institution was updated.
    pub merged_pis: usize,
    pub inserted_pis: u64,
    pub inserted_ports: u64,
    pub inserted_cruises: u64,
}

impl ReconcileSummary {
    /// Whether the run changed the catalog.
    pub fn mutated(&self) -> bool {
        self.inserted_pis > 0
            || self.inserted_ports > 0
            || self.inserted_cruises > 0
            || self.merged_pis > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cruise_key() {
        let cruise = CruiseRecord {
            cruise_id: "SR2301".to_string(),
            vessel: "R/V SALLY RIDE".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cruise.key(),
            ("SR2301".to_string(), "R/V SALLY RIDE".to_string())
        );
    }

    #[test]
    fn test_empty_summary_is_not_mutation() {
        let summary = ReconcileSummary {
            upstream_cruises: 12,
            ..Default::default()
        };
        assert!(!summary.mutated());
    }

    #[test]
    fn test_merge_only_summary_is_mutation() {
        let summary = ReconcileSummary {
            merged_pis: 1,
            ..Default::default()
        };
        assert!(summary.mutated());
    }
}
