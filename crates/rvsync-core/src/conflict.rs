//! Operator decisions for ambiguous PI names.
//!
//! A conflict arises when a PI classified missing has exactly the same
//! literal name as an existing catalog PI under a different institution. The
//! engine cannot tell whether that is one person who moved or two people who
//! share a name, so it emits a [`ConflictCase`] and waits for a
//! [`ConflictDecision`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::logging::subsystem;
use crate::traits::ConflictResolver;

/// Prefix marking a merge answer in operator text (`m.<institution>`).
pub const MERGE_PREFIX: &str = "m.";

/// One ambiguous PI name awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCase {
    /// The literal name shared by the upstream PI and a catalog row.
    pub pi_name: String,
    /// Institution currently stored on the catalog row.
    pub existing_institution: String,
    /// Institution resolved for the upstream PI.
    pub new_institution: String,
}

/// The operator's answer for a [`ConflictCase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "lowercase")]
pub enum ConflictDecision {
    /// Same person: map onto the existing row, insert nothing.
    Bundle,
    /// Different person: insert a new row named `"<name> (<suffix>)"`.
    Rename(String),
    /// Same person, moved: update the existing row's institution and map
    /// onto it.
    Merge(String),
}

impl ConflictDecision {
    /// Interpret free operator text.
    ///
    /// Empty → bundle; `m.<institution>` → merge; anything else is a rename
    /// suffix.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            Self::Bundle
        } else if let Some(institution) = input.strip_prefix(MERGE_PREFIX) {
            Self::Merge(institution.trim().to_string())
        } else {
            Self::Rename(input.to_string())
        }
    }

    /// Name the PI row will carry after this decision.
    pub fn target_name(&self, pi_name: &str) -> String {
        match self {
            Self::Rename(suffix) => format!("{} ({})", pi_name, suffix),
            Self::Bundle | Self::Merge(_) => pi_name.to_string(),
        }
    }

    /// Whether the decision requires inserting a new PI row.
    pub fn inserts_row(&self) -> bool {
        matches!(self, Self::Rename(_))
    }
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundle => write!(f, "bundle"),
            Self::Rename(suffix) => write!(f, "rename ({})", suffix),
            Self::Merge(institution) => write!(f, "merge (institution: {})", institution),
        }
    }
}

/// Resolver for unattended runs: every ambiguous name is bundled with the
/// existing row.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysBundle;

#[async_trait]
impl ConflictResolver for AlwaysBundle {
    async fn resolve(&self, case: &ConflictCase) -> Result<ConflictDecision> {
        tracing::debug!(
            subsystem = subsystem::RECONCILE,
            component = "conflict",
            pi_name = %case.pi_name,
            "Bundling ambiguous PI without operator input"
        );
        Ok(ConflictDecision::Bundle)
    }
}
