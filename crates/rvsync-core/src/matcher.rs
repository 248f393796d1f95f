//! EXISTS / MISSING decisions for cruises, PIs and ports.
//!
//! All decisions are made against one [`CatalogSnapshot`]; nothing here
//! touches the database.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::defaults::COUNTRY_CODE_MAX_LEN;
use crate::models::{CatalogPort, CruiseRecord, PersonIdentity, PortCandidate};
use crate::normalize::{normalize_institution, parse_pi_name, split_port_suffix};
use crate::snapshot::CatalogSnapshot;
use crate::vocabulary::VocabularyIndex;

/// Country code → full country name, learned from the catalog's own ports.
///
/// The port vocabulary only supplies a short code, while the catalog stores
/// the full country name; catalog ports named `"..., XX"` show which full
/// name each code stands for. The majority name per code wins, ties going to
/// the alphabetically first name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMap {
    names: HashMap<String, String>,
}

impl CountryMap {
    pub fn from_ports(ports: &[CatalogPort]) -> Self {
        let mut counts: HashMap<String, HashMap<&str, usize>> = HashMap::new();
        for port in ports {
            let Some(country) = port.port_country.as_deref().filter(|c| !c.is_empty()) else {
                continue;
            };
            let Some((_, code)) = split_port_suffix(&port.port_name) else {
                continue;
            };
            if code.is_empty() || code.chars().count() > COUNTRY_CODE_MAX_LEN {
                continue;
            }
            *counts
                .entry(code.to_lowercase())
                .or_default()
                .entry(country)
                .or_default() += 1;
        }

        let names = counts
            .into_iter()
            .filter_map(|(code, tally)| {
                tally
                    .into_iter()
                    .max_by(|(a_name, a_count), (b_name, b_count)| {
                        a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
                    })
                    .map(|(name, _)| (code, name.to_string()))
            })
            .collect();

        Self { names }
    }

    /// Full country name for a code, or the upper-cased code when unknown.
    pub fn expand(&self, code: &str) -> String {
        let code = code.trim().to_lowercase();
        self.names
            .get(&code)
            .cloned()
            .unwrap_or_else(|| code.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Result of classifying the upstream cruises against the snapshot.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// Cruises absent from the catalog, in upstream order.
    pub missing_cruises: Vec<CruiseRecord>,
    /// Every PI referenced by a missing cruise, keyed by raw name.
    pub pis: BTreeMap<String, PersonIdentity>,
    /// Subset of `pis` not found in the catalog.
    pub missing_pis: BTreeMap<String, PersonIdentity>,
    /// Every port referenced by a missing cruise, keyed by display name.
    pub ports: BTreeMap<String, PortCandidate>,
    /// Subset of `ports` not found in the catalog.
    pub missing_ports: BTreeMap<String, PortCandidate>,
}

/// Matches upstream entities against a catalog snapshot.
pub struct Matcher<'a> {
    snapshot: &'a CatalogSnapshot,
    vocab: &'a VocabularyIndex,
}

impl<'a> Matcher<'a> {
    pub fn new(snapshot: &'a CatalogSnapshot, vocab: &'a VocabularyIndex) -> Self {
        Self { snapshot, vocab }
    }

    /// A cruise is missing iff its `(cruise_id, vessel)` is not catalogued.
    pub fn is_cruise_missing(&self, cruise: &CruiseRecord) -> bool {
        !self.snapshot.has_cruise(&cruise.cruise_id, &cruise.vessel)
    }

    /// Parse a raw chief-scientist name and resolve its institution.
    ///
    /// The institution comes from person → organization vocabulary lookups;
    /// when the catalog already spells an equivalent institution, the
    /// catalog's spelling is kept.
    pub fn identify_pi(&self, raw_name: &str) -> PersonIdentity {
        let name = parse_pi_name(raw_name);
        let person = self.vocab.person_for(&name);
        let org = self.vocab.organization_for(person);

        let institution = self
            .snapshot
            .institution_spelling(&normalize_institution(&org.name))
            .map(str::to_string)
            .unwrap_or_else(|| org.name.clone());

        PersonIdentity {
            name,
            institution,
            r2r_id: person.r2r_id.clone(),
            r2r_institution: org.r2r_id.clone(),
        }
    }

    /// A PI exists when its registry id or its (normalized name, normalized
    /// institution) tuple is already catalogued.
    pub fn pi_exists(&self, pi: &PersonIdentity) -> bool {
        self.snapshot.has_pi_r2r_id(&pi.r2r_id)
            || self.snapshot.has_pi_tuple(
                &pi.name.normalized,
                &normalize_institution(&pi.institution),
            )
    }

    pub fn port_candidate(&self, raw_name: &str) -> PortCandidate {
        PortCandidate {
            display_name: self.vocab.normalize_port(raw_name),
            upstream_name: raw_name.to_string(),
        }
    }

    /// A port exists iff its display name is catalogued verbatim.
    pub fn port_exists(&self, port: &PortCandidate) -> bool {
        self.snapshot.has_port(&port.display_name)
    }

    /// Classify every upstream cruise and the PIs and ports the missing ones
    /// reference.
    pub fn classify(&self, cruises: &[CruiseRecord]) -> MatchReport {
        let mut report = MatchReport::default();
        let mut seen = HashSet::new();

        for cruise in cruises {
            if !self.is_cruise_missing(cruise) || !seen.insert(cruise.key()) {
                continue;
            }
            trace!(cruise_id = %cruise.cruise_id, vessel = %cruise.vessel, "Cruise missing");
            report.missing_cruises.push(cruise.clone());

            if !cruise.chief_scientist.is_empty() && !report.pis.contains_key(&cruise.chief_scientist) {
                let pi = self.identify_pi(&cruise.chief_scientist);
                report.pis.insert(cruise.chief_scientist.clone(), pi);
            }

            for raw_port in [&cruise.depart_port, &cruise.arrive_port] {
                if raw_port.is_empty() {
                    continue;
                }
                let port = self.port_candidate(raw_port);
                report.ports.entry(port.display_name.clone()).or_insert(port);
            }
        }

        for (raw_name, pi) in &report.pis {
            if self.pi_exists(pi) {
                debug!(pi_name = %raw_name, "PI already catalogued");
            } else {
                report.missing_pis.insert(raw_name.clone(), pi.clone());
            }
        }

        for (display_name, port) in &report.ports {
            if !self.port_exists(port) {
                debug!(port_name = %display_name, "Port missing");
                report.missing_ports.insert(display_name.clone(), port.clone());
            }
        }

        report
    }
}
