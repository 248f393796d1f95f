//! Dependency-ordered insertion planning.
//!
//! PIs and ports are planned first; their generated ids are read back and
//! merged with the snapshot's ids into [`ForeignKeys`], which the cruise rows
//! are then resolved against. The planner builds typed rows only; issuing
//! them is the pipeline's job.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::conflict::{ConflictCase, ConflictDecision};
use crate::error::Result;
use crate::matcher::CountryMap;
use crate::logging::subsystem;
use crate::models::*;
use crate::normalize::{normalize_institution, parse_pi_name};
use crate::snapshot::CatalogSnapshot;
use crate::traits::ConflictResolver;
use crate::vocabulary::VocabularyIndex;

/// What happens to the missing PIs once conflicts are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiPlan {
    /// Rows to insert.
    pub rows: Vec<NewPi>,
    /// Institution updates authorized by merge decisions.
    pub updates: Vec<InstitutionUpdate>,
    /// Raw upstream name → name of the catalog row cruises must reference.
    pub remap: BTreeMap<String, String>,
    /// Decisions taken, in the order they were asked.
    pub decisions: Vec<(ConflictCase, ConflictDecision)>,
}

impl PiPlan {
    /// PIs mapped onto an existing row instead of inserted.
    pub fn bundled(&self) -> usize {
        self.decisions
            .iter()
            .filter(|(_, decision)| !decision.inserts_row())
            .count()
    }

    /// Names of the rows about to be inserted.
    pub fn inserted_names(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.pi_name.clone()).collect()
    }
}

/// Name → id maps for resolving cruise foreign keys.
///
/// Lookup order is remapped raw name, then exact catalog name, then
/// normalized alias. Aliases never displace an exact name, and the first row
/// to claim an alias keeps it, so catalog rows win over rows inserted later.
#[derive(Debug, Clone, Default)]
pub struct ForeignKeys {
    remapped: HashMap<String, i64>,
    pi_ids: HashMap<String, i64>,
    pi_aliases: HashMap<String, i64>,
    pi_names: HashMap<i64, String>,
    port_ids: HashMap<String, i64>,
}

impl ForeignKeys {
    /// Seed with the PIs already in the snapshot, by literal and normalized
    /// name.
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        let mut keys = Self::default();
        for pi in snapshot.pis() {
            keys.add_pi(pi.id, &pi.pi_name);
        }
        keys
    }

    fn add_pi(&mut self, id: i64, name: &str) {
        self.pi_ids.insert(name.to_string(), id);
        self.pi_aliases
            .entry(parse_pi_name(name).normalized)
            .or_insert(id);
        self.pi_names.insert(id, name.to_string());
    }

    /// Merge ids read back after the PI insert, then point every raw name at
    /// the row it was remapped to.
    pub fn add_inserted_pis(&mut self, inserted: &[CatalogId], remap: &BTreeMap<String, String>) {
        for row in inserted {
            self.add_pi(row.id, &row.name);
        }
        for (original, target) in remap {
            if let Some(id) = self.pi_ids.get(target).copied() {
                self.remapped.insert(original.clone(), id);
            }
        }
    }

    pub fn add_ports(&mut self, ports: &[CatalogId]) {
        for row in ports {
            self.port_ids.insert(row.name.clone(), row.id);
        }
    }

    /// Id and catalog name of the PI a raw upstream name resolves to.
    pub fn pi(&self, raw_name: &str) -> Option<(i64, &str)> {
        if raw_name.is_empty() {
            return None;
        }
        let parsed = parse_pi_name(raw_name);
        let id = self
            .remapped
            .get(&parsed.original)
            .or_else(|| self.pi_ids.get(&parsed.original))
            .or_else(|| self.pi_aliases.get(&parsed.normalized))
            .copied()?;
        Some((id, self.pi_names.get(&id).map(String::as_str).unwrap_or_default()))
    }

    pub fn port(&self, display_name: &str) -> Option<i64> {
        if display_name.is_empty() {
            return None;
        }
        self.port_ids.get(display_name).copied()
    }
}

/// Builds the PI, port and cruise insert batches.
pub struct InsertionPlanner<'a> {
    snapshot: &'a CatalogSnapshot,
    vocab: &'a VocabularyIndex,
    countries: CountryMap,
}

impl<'a> InsertionPlanner<'a> {
    pub fn new(snapshot: &'a CatalogSnapshot, vocab: &'a VocabularyIndex) -> Self {
        Self {
            snapshot,
            vocab,
            countries: CountryMap::from_ports(snapshot.ports()),
        }
    }

    /// The conflict case for a missing PI, if its literal name is taken.
    pub fn conflict_case(&self, pi: &PersonIdentity) -> Option<ConflictCase> {
        let existing = self.snapshot.pi_institution(&pi.name.original)?;
        Some(ConflictCase {
            pi_name: pi.name.original.clone(),
            existing_institution: existing.to_string(),
            new_institution: pi.institution.clone(),
        })
    }

    /// Resolve conflicts and decide which missing PIs become rows.
    ///
    /// The resolver is asked once per ambiguous name, in name order. Missing
    /// PIs sharing a (normalized name, normalized institution) tuple are
    /// inserted once; later spellings are remapped onto the first.
    pub async fn plan_pis<R>(
        &self,
        missing: &BTreeMap<String, PersonIdentity>,
        resolver: &R,
    ) -> Result<PiPlan>
    where
        R: ConflictResolver + ?Sized,
    {
        let mut plan = PiPlan::default();
        let mut planned_tuples: HashMap<(String, String), String> = HashMap::new();

        for (raw_name, pi) in missing {
            let mut insert_name = raw_name.clone();

            if let Some(case) = self.conflict_case(pi) {
                let decision = resolver.resolve(&case).await?;
                info!(
                    subsystem = subsystem::RECONCILE,
                    component = "planner",
                    pi_name = %raw_name,
                    decision = %decision,
                    "Conflict resolved"
                );
                insert_name = decision.target_name(raw_name);
                if let ConflictDecision::Merge(institution) = &decision {
                    plan.updates.push(InstitutionUpdate {
                        pi_name: raw_name.clone(),
                        institution: institution.clone(),
                    });
                }
                let inserts = decision.inserts_row();
                plan.decisions.push((case, decision));
                if !inserts {
                    plan.remap.insert(raw_name.clone(), insert_name);
                    continue;
                }
            } else {
                let tuple = (
                    pi.name.normalized.clone(),
                    normalize_institution(&pi.institution),
                );
                if let Some(first) = planned_tuples.get(&tuple) {
                    debug!(pi_name = %raw_name, same_as = %first, "PI variant folded into batch row");
                    plan.remap.insert(raw_name.clone(), first.clone());
                    continue;
                }
                planned_tuples.insert(tuple, insert_name.clone());
            }

            plan.remap.insert(raw_name.clone(), insert_name.clone());
            plan.rows.push(NewPi {
                pi_name: insert_name,
                first_name: pi.name.first.clone(),
                last_name: pi.name.last.clone(),
                institution: pi.institution.clone(),
                r2r_id: pi.r2r_id.trim().parse().ok(),
                r2r_institution: pi.r2r_institution.clone(),
            });
        }

        Ok(plan)
    }

    /// Port rows for the missing ports, coordinates and external id from the
    /// port vocabulary and country from the catalog-derived expansion.
    pub fn plan_ports(&self, missing: &BTreeMap<String, PortCandidate>) -> Vec<NewPort> {
        missing
            .values()
            .map(|port| {
                let entry = self.vocab.port(&port.upstream_name);
                let country = if entry.country_id3.trim().is_empty() {
                    String::new()
                } else {
                    self.countries.expand(&entry.country_id3)
                };
                NewPort {
                    port_name: port.display_name.clone(),
                    r2r_id: entry.r2r_id.clone(),
                    latitude: parse_number(&entry.latitude),
                    longitude: parse_number(&entry.longitude),
                    country,
                }
            })
            .collect()
    }

    /// Cruise rows with PI and port foreign keys resolved.
    ///
    /// An empty chief scientist or port yields a null key; so does a name the
    /// maps cannot resolve.
    pub fn plan_cruises(&self, cruises: &[CruiseRecord], keys: &ForeignKeys) -> Vec<NewCruise> {
        cruises
            .iter()
            .map(|cruise| {
                let pi = keys.pi(&cruise.chief_scientist);
                let port_start = self.display_port(&cruise.depart_port);
                let port_end = self.display_port(&cruise.arrive_port);

                NewCruise {
                    cruise_id: cruise.cruise_id.clone(),
                    title: cruise.title.clone(),
                    vessel: cruise.vessel.clone(),
                    start_date: parse_date(&cruise.depart_date),
                    end_date: parse_date(&cruise.arrive_date),
                    pi_id: pi.map(|(id, _)| id),
                    pi_name: pi
                        .map(|(_, name)| name.to_string())
                        .filter(|name| !name.is_empty()),
                    port_start_id: port_start.as_deref().and_then(|p| keys.port(p)),
                    port_end_id: port_end.as_deref().and_then(|p| keys.port(p)),
                    port_start,
                    port_end,
                    latitude_min: parse_number(&cruise.latitude_min),
                    latitude_max: parse_number(&cruise.latitude_max),
                    longitude_min: parse_number(&cruise.longitude_min),
                    longitude_max: parse_number(&cruise.longitude_max),
                    institution: cruise.operator_name.clone(),
                }
            })
            .collect()
    }

    fn display_port(&self, raw: &str) -> Option<String> {
        if raw.is_empty() {
            None
        } else {
            Some(self.vocab.normalize_port(raw))
        }
    }
}

/// Parse a registry number; empty, `None` and `NULL` mean absent.
fn parse_number(value: &str) -> Option<f64> {
    match value.trim() {
        "" | "None" | "NULL" | "null" => None,
        v => v.parse().ok(),
    }
}

/// Parse the date part of a registry date or timestamp.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
