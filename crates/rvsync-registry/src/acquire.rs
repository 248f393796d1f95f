//! Phase 1: concurrent retrieval of cruises and vocabularies.
//!
//! One task per vessel and one per vocabulary run on a [`JoinSet`], at most
//! `worker_pool_size` at a time. Tasks share nothing; a task that fails after
//! its retries contributes an empty result instead of failing the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use rvsync_core::logging::subsystem;
use rvsync_core::{
    CruiseRecord, Projection, SyncConfig, UpstreamData, Vessel, VocabularyIndex, VocabularySpec,
    ORGANIZATION_VOCABULARY, PERSON_VOCABULARY, PORT_VOCABULARY,
};

use crate::client::RegistryClient;

enum Fetched {
    Cruises(Vessel, Vec<CruiseRecord>),
    Vocabulary(&'static str, Projection),
}

/// Fetch every configured vessel's cruises and the three vocabularies.
///
/// Cruises come back in vessel-table order. An interrupt while waiting is
/// logged and ignored: the fetches keep running and are still collected.
pub async fn acquire(client: &RegistryClient, config: &SyncConfig) -> UpstreamData {
    let start = Instant::now();
    let permits = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
    let mut tasks = JoinSet::new();

    for vessel in &config.vessels {
        let client = client.clone();
        let permits = permits.clone();
        let vessel = vessel.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let cruises = match client.fetch_cruises(&vessel).await {
                Ok(cruises) => cruises,
                Err(e) => {
                    warn!(
                        subsystem = subsystem::REGISTRY,
                        component = "acquire",
                        vessel = %vessel.short_name,
                        error = %e,
                        "Giving up on vessel; continuing without its cruises"
                    );
                    Vec::new()
                }
            };
            Fetched::Cruises(vessel, cruises)
        });
    }

    for spec in [PORT_VOCABULARY, PERSON_VOCABULARY, ORGANIZATION_VOCABULARY] {
        let client = client.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            Fetched::Vocabulary(spec.vocab_type, fetch_vocabulary(&client, &spec).await)
        });
    }

    let mut cruises_by_vessel: HashMap<String, Vec<CruiseRecord>> = HashMap::new();
    let mut vocabularies: HashMap<&'static str, Projection> = HashMap::new();
    let mut interrupted = false;

    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Ok(Fetched::Cruises(vessel, cruises))) => {
                    cruises_by_vessel.insert(vessel.short_name, cruises);
                }
                Some(Ok(Fetched::Vocabulary(vocab_type, projection))) => {
                    vocabularies.insert(vocab_type, projection);
                }
                Some(Err(e)) => {
                    error!(
                        subsystem = subsystem::REGISTRY,
                        component = "acquire",
                        error = %e,
                        "Fetch task failed"
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                warn!(
                    subsystem = subsystem::REGISTRY,
                    component = "acquire",
                    "Interrupt received while fetching; waiting for running requests"
                );
            }
        }
    }

    let cruises: Vec<CruiseRecord> = config
        .vessels
        .iter()
        .flat_map(|vessel| {
            cruises_by_vessel
                .remove(&vessel.short_name)
                .unwrap_or_default()
        })
        .collect();

    let mut take = |spec: &VocabularySpec| vocabularies.remove(spec.vocab_type).unwrap_or_default();
    let vocab = VocabularyIndex::from_projections(
        take(&PORT_VOCABULARY),
        take(&PERSON_VOCABULARY),
        take(&ORGANIZATION_VOCABULARY),
    );

    let (ports, persons, organizations) = vocab.sizes();
    info!(
        subsystem = subsystem::REGISTRY,
        component = "acquire",
        op = "acquire",
        cruises = cruises.len(),
        ports,
        persons,
        organizations,
        duration_ms = start.elapsed().as_millis() as u64,
        "Registry data fetched"
    );

    UpstreamData { cruises, vocab }
}

async fn fetch_vocabulary(client: &RegistryClient, spec: &VocabularySpec) -> Projection {
    match client.fetch_vocabulary(spec).await {
        Ok(projection) => projection,
        Err(e) => {
            warn!(
                subsystem = subsystem::REGISTRY,
                component = "acquire",
                vocab_type = spec.vocab_type,
                error = %e,
                "Giving up on vocabulary; continuing with it empty"
            );
            Projection::new()
        }
    }
}
