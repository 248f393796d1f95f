//! Point-in-time read of the catalog used for every matching decision.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Instant;

use tracing::{error, info};

use crate::config::ReadFailurePolicy;
use crate::error::Result;
use crate::models::{CatalogPi, CatalogPort};
use crate::logging::subsystem;
use crate::normalize::{normalize_institution, parse_pi_name};
use crate::traits::CatalogRepository;

/// The catalog's matching-relevant state, read once before any insert.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    cruises: HashMap<String, HashSet<String>>,
    pis: Vec<CatalogPi>,
    institutions: HashMap<String, String>,
    ports: Vec<CatalogPort>,
    pi_r2r_ids: HashSet<String>,
    pi_name_institutions: HashSet<(String, String)>,
    pi_names: HashMap<String, String>,
    port_names: HashSet<String>,
}

impl CatalogSnapshot {
    /// Build a snapshot from raw catalog rows.
    pub fn from_rows(
        cruise_keys: Vec<(String, String)>,
        pis: Vec<CatalogPi>,
        institutions: Vec<String>,
        ports: Vec<CatalogPort>,
    ) -> Self {
        let mut cruises: HashMap<String, HashSet<String>> = HashMap::new();
        for (cruise_id, vessel) in cruise_keys {
            cruises.entry(vessel).or_default().insert(cruise_id);
        }

        // First spelling seen for a normalized form is the canonical one.
        let mut institution_map = HashMap::new();
        for institution in institutions.into_iter().filter(|i| !i.is_empty()) {
            institution_map
                .entry(normalize_institution(&institution))
                .or_insert(institution);
        }

        let mut pi_r2r_ids = HashSet::new();
        let mut pi_name_institutions = HashSet::new();
        let mut pi_names = HashMap::new();
        for pi in &pis {
            if let Some(r2r_id) = pi.pi_r2r_id.as_deref().filter(|id| !id.is_empty()) {
                pi_r2r_ids.insert(r2r_id.to_string());
            }
            let institution = pi.pi_institution.clone().unwrap_or_default();
            pi_name_institutions.insert((
                parse_pi_name(&pi.pi_name).normalized,
                normalize_institution(&institution),
            ));
            pi_names.insert(pi.pi_name.clone(), institution);
        }

        let port_names = ports.iter().map(|p| p.port_name.clone()).collect();

        Self {
            cruises,
            pis,
            institutions: institution_map,
            ports,
            pi_r2r_ids,
            pi_name_institutions,
            pi_names,
            port_names,
        }
    }

    /// Read the snapshot from the catalog.
    ///
    /// Each read is subject to `policy`: under [`ReadFailurePolicy::Empty`] a
    /// failed read is logged and replaced by an empty row set.
    pub async fn load<C>(catalog: &C, vessels: &[String], policy: ReadFailurePolicy) -> Result<Self>
    where
        C: CatalogRepository + ?Sized,
    {
        let start = Instant::now();

        let cruise_keys = read("cruise_info", policy, catalog.list_cruise_keys(vessels)).await?;
        let institutions = read("pi_info", policy, catalog.list_institutions()).await?;
        let pis = read("pi_info", policy, catalog.list_pis()).await?;
        let ports = read("port_info", policy, catalog.list_ports()).await?;

        info!(
            subsystem = subsystem::RECONCILE,
            component = "snapshot",
            op = "load",
            cruises = cruise_keys.len(),
            pis = pis.len(),
            institutions = institutions.len(),
            ports = ports.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Catalog snapshot loaded"
        );

        Ok(Self::from_rows(cruise_keys, pis, institutions, ports))
    }

    /// Whether `(cruise_id, vessel)` is already catalogued.
    pub fn has_cruise(&self, cruise_id: &str, vessel: &str) -> bool {
        self.cruises
            .get(vessel)
            .is_some_and(|ids| ids.contains(cruise_id))
    }

    /// Catalog spelling of an institution with the same normalized form.
    pub fn institution_spelling(&self, normalized: &str) -> Option<&str> {
        self.institutions.get(normalized).map(String::as_str)
    }

    pub fn has_pi_r2r_id(&self, r2r_id: &str) -> bool {
        !r2r_id.is_empty() && self.pi_r2r_ids.contains(r2r_id)
    }

    /// Whether a PI with this (normalized name, normalized institution) exists.
    pub fn has_pi_tuple(&self, normalized_name: &str, normalized_institution: &str) -> bool {
        self.pi_name_institutions
            .contains(&(normalized_name.to_string(), normalized_institution.to_string()))
    }

    /// Institution of the PI row with exactly this name, if any.
    pub fn pi_institution(&self, pi_name: &str) -> Option<&str> {
        self.pi_names.get(pi_name).map(String::as_str)
    }

    pub fn has_port(&self, display_name: &str) -> bool {
        self.port_names.contains(display_name)
    }

    pub fn pis(&self) -> &[CatalogPi] {
        &self.pis
    }

    pub fn ports(&self) -> &[CatalogPort] {
        &self.ports
    }
}

async fn read<T, F>(table: &str, policy: ReadFailurePolicy, fut: F) -> Result<Vec<T>>
where
    F: Future<Output = Result<Vec<T>>>,
{
    match fut.await {
        Ok(rows) => Ok(rows),
        Err(e) if policy == ReadFailurePolicy::Empty => {
            error!(
                subsystem = subsystem::RECONCILE,
                component = "snapshot",
                db_table = table,
                error = %e,
                "Catalog read failed; continuing with no rows"
            );
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}
