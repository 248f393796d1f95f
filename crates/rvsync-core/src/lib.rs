//! # rvsync-core
//!
//! Entity resolution and insertion planning for reconciling the R2R cruise
//! registry into the cruise catalog.
//!
//! This crate holds everything that does not talk to the network or the
//! database directly: normalization, vocabulary lookups, matching against a
//! catalog snapshot, conflict decisions and the reconciliation pipeline. The
//! catalog and the operator are reached through the traits in [`traits`].

pub mod config;
pub mod conflict;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod planner;
pub mod snapshot;
pub mod traits;
pub mod vocabulary;

// Re-export commonly used types at crate root
pub use config::{parse_vessels, ReadFailurePolicy, RetryPolicy, SyncConfig};
pub use conflict::{AlwaysBundle, ConflictCase, ConflictDecision};
pub use error::{Error, Result};
pub use matcher::{CountryMap, MatchReport, Matcher};
pub use models::*;
pub use normalize::{normalize_institution, normalize_port_name, parse_pi_name, ParsedName};
pub use pipeline::{ReconciliationPipeline, UpstreamData};
pub use planner::{ForeignKeys, InsertionPlanner, PiPlan};
pub use snapshot::CatalogSnapshot;
pub use traits::*;
pub use vocabulary::{
    OrganizationEntry, PersonEntry, PortEntry, Projection, VocabularyIndex, VocabularySpec,
    ORGANIZATION_VOCABULARY, PERSON_VOCABULARY, PORT_VOCABULARY,
};
