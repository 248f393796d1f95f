//! Reconciliation pipeline tests against an in-memory catalog.
//!
//! The catalog mimics the PostgreSQL repository closely enough for the
//! pipeline: generated ids, batch inserts and name lookups. The scripted
//! resolver records each case it is asked about and how many writes the
//! catalog had seen at that moment.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use rvsync_core::{
    CatalogId, CatalogPi, CatalogPort, CatalogRepository, ConflictCase, ConflictDecision,
    ConflictResolver, CruiseRecord, Error, InstitutionUpdate, NewCruise, NewPi, NewPort,
    OrganizationEntry, PersonEntry, PortEntry, ReadFailurePolicy, ReconciliationPipeline, Result,
    SyncConfig, UpstreamData, VocabularyIndex,
};

const VESSEL: &str = "R/V SALLY RIDE";
const SCRIPPS: &str = "Scripps Institution of Oceanography";

// =============================================================================
// IN-MEMORY CATALOG
// =============================================================================

#[derive(Default)]
struct CatalogState {
    next_id: i64,
    cruise_keys: Vec<(String, String)>,
    pis: Vec<CatalogPi>,
    ports: Vec<(i64, CatalogPort)>,
    inserted_pis: Vec<NewPi>,
    inserted_ports: Vec<NewPort>,
    inserted_cruises: Vec<NewCruise>,
    updates: Vec<InstitutionUpdate>,
    writes: usize,
}

#[derive(Default)]
struct MemoryCatalog {
    state: Mutex<CatalogState>,
    fail_reads: bool,
    fail_cruise_insert: bool,
}

impl MemoryCatalog {
    fn new() -> Self {
        let catalog = Self::default();
        catalog.state.lock().unwrap().next_id = 100;
        catalog
    }

    fn with_cruise(self, cruise_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .cruise_keys
            .push((cruise_id.to_string(), VESSEL.to_string()));
        self
    }

    fn with_pi(self, id: i64, name: &str, institution: &str) -> Self {
        self.state.lock().unwrap().pis.push(CatalogPi {
            id,
            pi_name: name.to_string(),
            pi_institution: Some(institution.to_string()),
            pi_r2r_id: None,
        });
        self
    }

    fn with_port(self, id: i64, name: &str, country: &str) -> Self {
        self.state.lock().unwrap().ports.push((
            id,
            CatalogPort {
                port_name: name.to_string(),
                port_country: Some(country.to_string()),
            },
        ));
        self
    }

    fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn read_error(&self) -> Result<()> {
        if self.fail_reads {
            Err(Error::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn list_cruise_keys(&self, vessels: &[String]) -> Result<Vec<(String, String)>> {
        self.read_error()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .cruise_keys
            .iter()
            .filter(|(_, vessel)| vessels.contains(vessel))
            .cloned()
            .collect())
    }

    async fn list_pis(&self) -> Result<Vec<CatalogPi>> {
        self.read_error()?;
        Ok(self.state.lock().unwrap().pis.clone())
    }

    async fn list_institutions(&self) -> Result<Vec<String>> {
        self.read_error()?;
        let state = self.state.lock().unwrap();
        let mut institutions: Vec<String> = state
            .pis
            .iter()
            .filter_map(|pi| pi.pi_institution.clone())
            .collect();
        institutions.dedup();
        Ok(institutions)
    }

    async fn list_ports(&self) -> Result<Vec<CatalogPort>> {
        self.read_error()?;
        let state = self.state.lock().unwrap();
        Ok(state.ports.iter().map(|(_, port)| port.clone()).collect())
    }

    async fn update_pi_institution(&self, update: &InstitutionUpdate) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let mut changed = 0;
        for pi in state.pis.iter_mut().filter(|pi| pi.pi_name == update.pi_name) {
            pi.pi_institution = Some(update.institution.clone());
            changed += 1;
        }
        state.updates.push(update.clone());
        Ok(changed)
    }

    async fn insert_pis(&self, rows: &[NewPi]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        for row in rows {
            state.next_id += 1;
            let id = state.next_id;
            state.pis.push(CatalogPi {
                id,
                pi_name: row.pi_name.clone(),
                pi_institution: Some(row.institution.clone()),
                pi_r2r_id: row.r2r_id.map(|id| id.to_string()),
            });
            state.inserted_pis.push(row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn insert_ports(&self, rows: &[NewPort]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        for row in rows {
            state.next_id += 1;
            let id = state.next_id;
            state.ports.push((
                id,
                CatalogPort {
                    port_name: row.port_name.clone(),
                    port_country: Some(row.country.clone()),
                },
            ));
            state.inserted_ports.push(row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn pi_ids(&self, names: &[String]) -> Result<Vec<CatalogId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pis
            .iter()
            .filter(|pi| names.contains(&pi.pi_name))
            .map(|pi| CatalogId {
                id: pi.id,
                name: pi.pi_name.clone(),
            })
            .collect())
    }

    async fn port_ids(&self, names: &[String]) -> Result<Vec<CatalogId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ports
            .iter()
            .filter(|(_, port)| names.contains(&port.port_name))
            .map(|(id, port)| CatalogId {
                id: *id,
                name: port.port_name.clone(),
            })
            .collect())
    }

    async fn insert_cruises(&self, rows: &[NewCruise]) -> Result<u64> {
        if self.fail_cruise_insert {
            return Err(Error::Database(sqlx::Error::RowNotFound));
        }
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.inserted_cruises.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }
}

// =============================================================================
// SCRIPTED RESOLVER
// =============================================================================

struct ScriptedResolver {
    catalog: Arc<MemoryCatalog>,
    decisions: Mutex<VecDeque<ConflictDecision>>,
    asked: Mutex<Vec<(ConflictCase, usize)>>,
}

impl ScriptedResolver {
    fn new(catalog: Arc<MemoryCatalog>, decisions: Vec<ConflictDecision>) -> Self {
        Self {
            catalog,
            decisions: Mutex::new(decisions.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    fn asked(&self) -> Vec<(ConflictCase, usize)> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConflictResolver for ScriptedResolver {
    async fn resolve(&self, case: &ConflictCase) -> Result<ConflictDecision> {
        self.asked
            .lock()
            .unwrap()
            .push((case.clone(), self.catalog.writes()));
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Resolution("no scripted decision left".to_string()))
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

fn vocab() -> VocabularyIndex {
    VocabularyIndex::default()
        .with_person(
            "Ride, Sally K.",
            PersonEntry {
                org_shortname: "SIO".to_string(),
                r2r_id: String::new(),
            },
        )
        .with_person(
            "Ride, Sally",
            PersonEntry {
                org_shortname: "SIO".to_string(),
                r2r_id: String::new(),
            },
        )
        .with_organization(
            "SIO",
            OrganizationEntry {
                name: SCRIPPS.to_string(),
                r2r_id: "3".to_string(),
            },
        )
        .with_port(
            "La Jolla, California",
            PortEntry {
                latitude: "32.85".to_string(),
                longitude: "-117.27".to_string(),
                r2r_id: "41".to_string(),
                country_id3: "usa".to_string(),
            },
        )
}

fn cruise(cruise_id: &str, chief_scientist: &str) -> CruiseRecord {
    CruiseRecord {
        cruise_id: cruise_id.to_string(),
        vessel: VESSEL.to_string(),
        title: "Nearshore mooring recovery".to_string(),
        depart_date: "2023-05-01".to_string(),
        arrive_date: "2023-05-09T17:00:00".to_string(),
        chief_scientist: chief_scientist.to_string(),
        depart_port: "La Jolla, California".to_string(),
        arrive_port: "La Jolla, California".to_string(),
        operator_name: SCRIPPS.to_string(),
        operator_id: "3".to_string(),
        latitude_min: "32.1".to_string(),
        latitude_max: "33.0".to_string(),
        longitude_min: "-118.2".to_string(),
        longitude_max: "-117.2".to_string(),
    }
}

fn upstream(cruises: Vec<CruiseRecord>) -> UpstreamData {
    UpstreamData {
        cruises,
        vocab: vocab(),
    }
}

fn pipeline(
    catalog: &Arc<MemoryCatalog>,
    resolver: Arc<dyn ConflictResolver>,
) -> ReconciliationPipeline {
    ReconciliationPipeline::new(SyncConfig::default(), catalog.clone(), resolver)
}

fn no_conflicts(catalog: &Arc<MemoryCatalog>) -> Arc<ScriptedResolver> {
    Arc::new(ScriptedResolver::new(catalog.clone(), vec![]))
}

// =============================================================================
// END-TO-END SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_empty_catalog_inserts_pi_port_and_cruise() {
    let catalog = Arc::new(MemoryCatalog::new());
    let resolver = no_conflicts(&catalog);

    let summary = pipeline(&catalog, resolver.clone())
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await
        .unwrap();

    assert_eq!(summary.upstream_cruises, 1);
    assert_eq!(summary.missing_cruises, 1);
    assert_eq!(summary.inserted_pis, 1);
    assert_eq!(summary.inserted_ports, 1);
    assert_eq!(summary.inserted_cruises, 1);
    assert!(summary.mutated());
    assert!(resolver.asked().is_empty());

    let state = catalog.state.lock().unwrap();

    let pi = &state.inserted_pis[0];
    assert_eq!(pi.pi_name, "Ride, Sally K.");
    assert_eq!(pi.first_name, "Sally");
    assert_eq!(pi.last_name, "Ride");
    assert_eq!(pi.institution, SCRIPPS);
    assert_eq!(pi.r2r_institution, "3");

    let port = &state.inserted_ports[0];
    assert_eq!(port.port_name, "La Jolla, California, USA");
    assert_eq!(port.r2r_id, "41");
    assert_eq!(port.latitude, Some(32.85));
    // No catalog port teaches the expansion of "usa".
    assert_eq!(port.country, "USA");

    let pi_id = state.pis[0].id;
    let port_id = state.ports[0].0;
    let row = &state.inserted_cruises[0];
    assert_eq!(row.cruise_id, "SR2305");
    assert_eq!(row.vessel, VESSEL);
    assert_eq!(row.pi_id, Some(pi_id));
    assert_eq!(row.pi_name.as_deref(), Some("Ride, Sally K."));
    assert_eq!(row.port_start_id, Some(port_id));
    assert_eq!(row.port_end_id, Some(port_id));
    assert_eq!(row.port_start.as_deref(), Some("La Jolla, California, USA"));
    assert_eq!(row.start_date, NaiveDate::from_ymd_opt(2023, 5, 1));
    assert_eq!(row.end_date, NaiveDate::from_ymd_opt(2023, 5, 9));
    assert_eq!(row.longitude_min, Some(-118.2));
    assert_eq!(row.institution, SCRIPPS);
}

#[tokio::test]
async fn test_country_expanded_from_catalog_ports() {
    let catalog =
        Arc::new(MemoryCatalog::new().with_port(5, "San Diego, California, USA", "United States"));

    pipeline(&catalog, no_conflicts(&catalog))
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await
        .unwrap();

    let state = catalog.state.lock().unwrap();
    assert_eq!(state.inserted_ports[0].country, "United States");
}

#[tokio::test]
async fn test_existing_pi_tuple_is_reused() {
    let catalog = Arc::new(MemoryCatalog::new().with_pi(7, "Ride, Sally", SCRIPPS));
    let resolver = no_conflicts(&catalog);

    let summary = pipeline(&catalog, resolver.clone())
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await
        .unwrap();

    assert_eq!(summary.missing_pis, 0);
    assert_eq!(summary.inserted_pis, 0);
    assert!(resolver.asked().is_empty());

    let state = catalog.state.lock().unwrap();
    assert!(state.inserted_pis.is_empty());
    let row = &state.inserted_cruises[0];
    assert_eq!(row.pi_id, Some(7));
    assert_eq!(row.pi_name.as_deref(), Some("Ride, Sally"));
}

#[tokio::test]
async fn test_new_variant_does_not_capture_existing_exact_name() {
    let catalog = Arc::new(MemoryCatalog::new().with_pi(7, "Ride, Sally", "NASA"));
    let mut data = upstream(vec![
        cruise("A1", "Ride, Sally K."),
        cruise("B1", "Ride, Sally"),
    ]);
    data.vocab = data
        .vocab
        .with_person(
            "Ride, Sally",
            PersonEntry {
                org_shortname: "NASA".to_string(),
                r2r_id: String::new(),
            },
        )
        .with_organization(
            "NASA",
            OrganizationEntry {
                name: "NASA".to_string(),
                r2r_id: "9".to_string(),
            },
        );

    let summary = pipeline(&catalog, no_conflicts(&catalog))
        .run(&data)
        .await
        .unwrap();

    assert_eq!(summary.inserted_pis, 1);
    let state = catalog.state.lock().unwrap();
    assert_eq!(state.inserted_pis[0].pi_name, "Ride, Sally K.");
    let new_id = state
        .pis
        .iter()
        .find(|pi| pi.pi_name == "Ride, Sally K.")
        .map(|pi| pi.id);

    let a1 = state.inserted_cruises.iter().find(|row| row.cruise_id == "A1").unwrap();
    assert_eq!(a1.pi_id, new_id);
    assert_eq!(a1.pi_name.as_deref(), Some("Ride, Sally K."));

    let b1 = state.inserted_cruises.iter().find(|row| row.cruise_id == "B1").unwrap();
    assert_eq!(b1.pi_id, Some(7));
    assert_eq!(b1.pi_name.as_deref(), Some("Ride, Sally"));
}

#[tokio::test]
async fn test_same_tuple_spellings_share_one_row() {
    let catalog = Arc::new(MemoryCatalog::new());
    let mut data = upstream(vec![
        cruise("TX1", "Smith, Craig"),
        cruise("TX2", "Smith, Craig R."),
    ]);
    data.vocab = data
        .vocab
        .with_person(
            "Smith, Craig",
            PersonEntry {
                org_shortname: "TAMU".to_string(),
                r2r_id: String::new(),
            },
        )
        .with_person(
            "Smith, Craig R.",
            PersonEntry {
                org_shortname: "TAMUG".to_string(),
                r2r_id: String::new(),
            },
        )
        .with_organization(
            "TAMU",
            OrganizationEntry {
                name: "Texas A&M".to_string(),
                r2r_id: "12".to_string(),
            },
        )
        .with_organization(
            "TAMUG",
            OrganizationEntry {
                name: "Texas A and M".to_string(),
                r2r_id: "13".to_string(),
            },
        );

    let summary = pipeline(&catalog, no_conflicts(&catalog))
        .run(&data)
        .await
        .unwrap();

    assert_eq!(summary.missing_pis, 2);
    assert_eq!(summary.inserted_pis, 1);
    assert_eq!(summary.inserted_cruises, 2);

    let state = catalog.state.lock().unwrap();
    assert_eq!(state.inserted_pis[0].pi_name, "Smith, Craig");
    let id = state.pis[0].id;
    assert!(state
        .inserted_cruises
        .iter()
        .all(|row| row.pi_id == Some(id) && row.pi_name.as_deref() == Some("Smith, Craig")));
}

#[tokio::test]
async fn test_conflict_asked_once_before_any_write() {
    let catalog = Arc::new(MemoryCatalog::new().with_pi(7, "Ride, Sally", "NASA"));
    let resolver = Arc::new(ScriptedResolver::new(
        catalog.clone(),
        vec![ConflictDecision::Bundle],
    ));

    let summary = pipeline(&catalog, resolver.clone())
        .run(&upstream(vec![
            cruise("SR2305", "Ride, Sally"),
            cruise("SR2306", "Ride, Sally"),
        ]))
        .await
        .unwrap();

    let asked = resolver.asked();
    assert_eq!(asked.len(), 1);
    let (case, writes_before) = &asked[0];
    assert_eq!(*writes_before, 0);
    assert_eq!(case.pi_name, "Ride, Sally");
    assert_eq!(case.existing_institution, "NASA");
    assert_eq!(case.new_institution, SCRIPPS);

    assert_eq!(summary.bundled_pis, 1);
    assert_eq!(summary.inserted_pis, 0);
    assert_eq!(summary.inserted_cruises, 2);

    let state = catalog.state.lock().unwrap();
    assert!(state
        .inserted_cruises
        .iter()
        .all(|row| row.pi_id == Some(7)));
}

#[tokio::test]
async fn test_conflict_rename_inserts_variant() {
    let catalog = Arc::new(MemoryCatalog::new().with_pi(7, "Ride, Sally", "NASA"));
    let resolver = Arc::new(ScriptedResolver::new(
        catalog.clone(),
        vec![ConflictDecision::Rename("SIO".to_string())],
    ));

    let summary = pipeline(&catalog, resolver)
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally")]))
        .await
        .unwrap();

    assert_eq!(summary.inserted_pis, 1);
    assert_eq!(summary.bundled_pis, 0);

    let state = catalog.state.lock().unwrap();
    assert_eq!(state.inserted_pis[0].pi_name, "Ride, Sally (SIO)");
    let new_id = state
        .pis
        .iter()
        .find(|pi| pi.pi_name == "Ride, Sally (SIO)")
        .map(|pi| pi.id);
    let row = &state.inserted_cruises[0];
    assert_eq!(row.pi_id, new_id);
    assert_eq!(row.pi_name.as_deref(), Some("Ride, Sally (SIO)"));
}

#[tokio::test]
async fn test_conflict_merge_updates_existing_row() {
    let catalog = Arc::new(MemoryCatalog::new().with_pi(7, "Ride, Sally", "NASA"));
    let resolver = Arc::new(ScriptedResolver::new(
        catalog.clone(),
        vec![ConflictDecision::Merge(SCRIPPS.to_string())],
    ));

    let summary = pipeline(&catalog, resolver)
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally")]))
        .await
        .unwrap();

    assert_eq!(summary.merged_pis, 1);
    assert_eq!(summary.inserted_pis, 0);

    let state = catalog.state.lock().unwrap();
    assert_eq!(state.pis[0].pi_institution.as_deref(), Some(SCRIPPS));
    assert_eq!(state.inserted_cruises[0].pi_id, Some(7));
}

#[tokio::test]
async fn test_resolver_failure_aborts_before_writes() {
    let catalog = Arc::new(MemoryCatalog::new().with_pi(7, "Ride, Sally", "NASA"));
    let resolver = no_conflicts(&catalog);

    let result = pipeline(&catalog, resolver)
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally")]))
        .await;

    assert!(matches!(result, Err(Error::Resolution(_))));
    assert_eq!(catalog.writes(), 0);
}

// =============================================================================
// NO-OP AND FAILURE PATHS
// =============================================================================

#[tokio::test]
async fn test_no_missing_cruises_means_no_mutation() {
    let catalog = Arc::new(MemoryCatalog::new().with_cruise("SR2305"));

    let summary = pipeline(&catalog, no_conflicts(&catalog))
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await
        .unwrap();

    assert_eq!(summary.missing_cruises, 0);
    assert!(!summary.mutated());
    assert_eq!(catalog.writes(), 0);
}

#[tokio::test]
async fn test_no_upstream_cruises_means_no_mutation() {
    let catalog = Arc::new(MemoryCatalog::new());

    let summary = pipeline(&catalog, no_conflicts(&catalog))
        .run(&upstream(vec![]))
        .await
        .unwrap();

    assert_eq!(summary.upstream_cruises, 0);
    assert_eq!(catalog.writes(), 0);
}

#[tokio::test]
async fn test_read_failure_propagates_by_default() {
    let catalog = Arc::new(MemoryCatalog {
        fail_reads: true,
        ..MemoryCatalog::new()
    });

    let result = pipeline(&catalog, no_conflicts(&catalog))
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await;

    assert!(matches!(result, Err(Error::Database(_))));
    assert_eq!(catalog.writes(), 0);
}

#[tokio::test]
async fn test_read_failure_treated_as_empty_when_configured() {
    let catalog = Arc::new(MemoryCatalog {
        fail_reads: true,
        ..MemoryCatalog::new()
    });
    let config = SyncConfig {
        read_failure: ReadFailurePolicy::Empty,
        ..SyncConfig::default()
    };

    let summary = ReconciliationPipeline::new(config, catalog.clone(), no_conflicts(&catalog))
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await
        .unwrap();

    assert_eq!(summary.missing_cruises, 1);
    assert_eq!(summary.inserted_cruises, 1);
}

#[tokio::test]
async fn test_write_failure_aborts_run() {
    let catalog = Arc::new(MemoryCatalog {
        fail_cruise_insert: true,
        ..MemoryCatalog::new()
    });

    let result = pipeline(&catalog, no_conflicts(&catalog))
        .run(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await;

    assert!(matches!(result, Err(Error::Database(_))));
    assert!(catalog.state.lock().unwrap().inserted_cruises.is_empty());
}

#[tokio::test]
async fn test_preview_does_not_write() {
    let catalog = Arc::new(MemoryCatalog::new());

    let report = pipeline(&catalog, no_conflicts(&catalog))
        .preview(&upstream(vec![cruise("SR2305", "Ride, Sally K.")]))
        .await
        .unwrap();

    assert_eq!(report.missing_cruises.len(), 1);
    assert_eq!(report.missing_pis.len(), 1);
    assert!(report.missing_ports.contains_key("La Jolla, California, USA"));
    assert_eq!(catalog.writes(), 0);
}
