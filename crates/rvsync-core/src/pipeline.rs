//! Phase-2 reconciliation: snapshot, match, resolve, insert.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::matcher::{MatchReport, Matcher};
use crate::models::{CruiseRecord, ReconcileSummary};
use crate::planner::{ForeignKeys, InsertionPlanner};
use crate::snapshot::CatalogSnapshot;
use crate::traits::{CatalogRepository, ConflictResolver};
use crate::logging::subsystem;
use crate::vocabulary::VocabularyIndex;

/// Upstream data gathered in phase 1.
#[derive(Debug, Clone, Default)]
pub struct UpstreamData {
    /// Cruises across all configured vessels, vessel names already canonical.
    pub cruises: Vec<CruiseRecord>,
    pub vocab: VocabularyIndex,
}

/// Reconciles upstream cruises into the catalog.
///
/// Runs strictly sequentially. The catalog is read once into a
/// [`CatalogSnapshot`]; every EXISTS/MISSING decision is taken against it and
/// only foreign-key resolution reads the catalog again after insertion.
pub struct ReconciliationPipeline {
    config: SyncConfig,
    catalog: Arc<dyn CatalogRepository>,
    resolver: Arc<dyn ConflictResolver>,
}

impl ReconciliationPipeline {
    pub fn new(
        config: SyncConfig,
        catalog: Arc<dyn CatalogRepository>,
        resolver: Arc<dyn ConflictResolver>,
    ) -> Self {
        Self {
            config,
            catalog,
            resolver,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        CatalogSnapshot::load(
            self.catalog.as_ref(),
            &self.config.canonical_vessels(),
            self.config.read_failure,
        )
        .await
    }

    /// Classify without writing anything.
    pub async fn preview(&self, upstream: &UpstreamData) -> Result<MatchReport> {
        let snapshot = self.snapshot().await?;
        Ok(Matcher::new(&snapshot, &upstream.vocab).classify(&upstream.cruises))
    }

    /// Run reconciliation and insert whatever is missing.
    ///
    /// Zero upstream cruises or zero missing cruises leave the catalog
    /// untouched. Any failed write aborts the run; stages already committed
    /// stay committed.
    #[instrument(skip_all, fields(subsystem = subsystem::RECONCILE, upstream = upstream.cruises.len()))]
    pub async fn run(&self, upstream: &UpstreamData) -> Result<ReconcileSummary> {
        let start = Instant::now();
        let mut summary = ReconcileSummary {
            upstream_cruises: upstream.cruises.len(),
            ..Default::default()
        };

        if upstream.cruises.is_empty() {
            warn!(
                subsystem = subsystem::RECONCILE,
                component = "pipeline",
                "No cruises fetched from the registry; nothing to reconcile"
            );
            return Ok(summary);
        }

        let snapshot = self.snapshot().await?;
        let report = Matcher::new(&snapshot, &upstream.vocab).classify(&upstream.cruises);

        summary.missing_cruises = report.missing_cruises.len();
        summary.missing_pis = report.missing_pis.len();
        summary.missing_ports = report.missing_ports.len();

        info!(
            subsystem = subsystem::RECONCILE,
            component = "matcher",
            op = "classify",
            missing_cruises = summary.missing_cruises,
            missing_pis = summary.missing_pis,
            missing_ports = summary.missing_ports,
            existing_pis = report.pis.len() - report.missing_pis.len(),
            existing_ports = report.ports.len() - report.missing_ports.len(),
            "Upstream classified against catalog"
        );

        if report.missing_cruises.is_empty() {
            info!(
                subsystem = subsystem::RECONCILE,
                component = "pipeline",
                "No missing cruises to insert"
            );
            return Ok(summary);
        }

        let planner = InsertionPlanner::new(&snapshot, &upstream.vocab);

        // Every conflict is resolved before the first write.
        let pi_plan = planner
            .plan_pis(&report.missing_pis, self.resolver.as_ref())
            .await?;
        summary.bundled_pis = pi_plan.bundled();

        for update in &pi_plan.updates {
            self.catalog.update_pi_institution(update).await?;
            info!(
                subsystem = subsystem::RECONCILE,
                component = "pipeline",
                op = "merge",
                pi_name = %update.pi_name,
                institution = %update.institution,
                "PI institution updated"
            );
        }
        summary.merged_pis = pi_plan.updates.len();

        if !pi_plan.rows.is_empty() {
            summary.inserted_pis = self.catalog.insert_pis(&pi_plan.rows).await?;
            info!(
                subsystem = subsystem::RECONCILE,
                component = "pipeline",
                op = "insert",
                db_table = "pi_info",
                result_count = summary.inserted_pis,
                "PIs inserted"
            );
        }

        let port_rows = planner.plan_ports(&report.missing_ports);
        if !port_rows.is_empty() {
            summary.inserted_ports = self.catalog.insert_ports(&port_rows).await?;
            info!(
                subsystem = subsystem::RECONCILE,
                component = "pipeline",
                op = "insert",
                db_table = "port_info",
                result_count = summary.inserted_ports,
                "Ports inserted"
            );
        }

        let mut keys = ForeignKeys::from_snapshot(&snapshot);
        let inserted_names = pi_plan.inserted_names();
        let inserted_ids = if inserted_names.is_empty() {
            Vec::new()
        } else {
            self.catalog.pi_ids(&inserted_names).await?
        };
        keys.add_inserted_pis(&inserted_ids, &pi_plan.remap);
        let referenced_ports: Vec<String> = report.ports.keys().cloned().collect();
        if !referenced_ports.is_empty() {
            keys.add_ports(&self.catalog.port_ids(&referenced_ports).await?);
        }

        let cruise_rows = planner.plan_cruises(&report.missing_cruises, &keys);
        summary.inserted_cruises = self.catalog.insert_cruises(&cruise_rows).await?;

        info!(
            subsystem = subsystem::RECONCILE,
            component = "pipeline",
            op = "run",
            inserted_pis = summary.inserted_pis,
            inserted_ports = summary.inserted_ports,
            inserted_cruises = summary.inserted_cruises,
            bundled_pis = summary.bundled_pis,
            merged_pis = summary.merged_pis,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reconciliation complete"
        );

        Ok(summary)
    }
}
