//! HTTP client for the R2R registry API.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use rvsync_core::logging::subsystem;
use rvsync_core::{
    CruiseRecord, Error, Projection, Result, RetryPolicy, SyncConfig, Vessel, VocabularySpec,
};

/// Envelope of every registry response.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

/// Read a registry field as text. Missing and null become empty; numbers and
/// booleans are rendered as written.
fn text(item: &Map<String, Value>, field: &str) -> String {
    match item.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Client for the cruise and vocabulary endpoints.
///
/// Every request carries the configured timeout and is retried on transient
/// failures (network errors, unreadable bodies, any non-2xx status) with
/// exponential backoff.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(config.registry_url.clone(), config.retry)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_once(&self, url: &str, query: &[(&str, &str)]) -> Result<Envelope> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Envelope> {
        let url = format!("{}/{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            match self.get_once(&url, query).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        subsystem = subsystem::REGISTRY,
                        component = "client",
                        url = %url,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Registry request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cruises reported for one vessel.
    ///
    /// Only records whose `vessel_name` equals the vessel's short name are
    /// kept; the rest of the response is ignored. A cruise id listed twice is
    /// kept once, at its first position.
    #[instrument(skip_all, fields(subsystem = subsystem::REGISTRY, component = "client", op = "fetch_cruises", vessel = %vessel.short_name))]
    pub async fn fetch_cruises(&self, vessel: &Vessel) -> Result<Vec<CruiseRecord>> {
        let start = Instant::now();
        let envelope = self.get("cruise", &[("vessel", vessel.short_name.as_str())]).await?;

        let mut seen = HashSet::new();
        let cruises: Vec<CruiseRecord> = envelope
            .data
            .iter()
            .filter(|item| text(item, "vessel_name") == vessel.short_name)
            .map(|item| CruiseRecord {
                cruise_id: text(item, "cruise_id"),
                vessel: vessel.canonical_name.clone(),
                title: text(item, "cruise_name"),
                depart_date: text(item, "depart_date"),
                arrive_date: text(item, "arrive_date"),
                chief_scientist: text(item, "chief_scientist"),
                depart_port: text(item, "depart_port_fullname"),
                arrive_port: text(item, "arrive_port_fullname"),
                operator_name: text(item, "operator_name"),
                operator_id: text(item, "operator_id"),
                latitude_min: text(item, "latitude_min"),
                latitude_max: text(item, "latitude_max"),
                longitude_min: text(item, "longitude_min"),
                longitude_max: text(item, "longitude_max"),
            })
            .filter(|cruise| seen.insert(cruise.cruise_id.clone()))
            .collect();

        info!(
            result_count = cruises.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Registry cruises retrieved"
        );
        Ok(cruises)
    }

    /// One controlled vocabulary, projected by `spec`.
    ///
    /// Items without a key value are dropped; absent fields project to empty
    /// text.
    #[instrument(skip_all, fields(subsystem = subsystem::REGISTRY, component = "client", op = "fetch_vocabulary", vocab_type = spec.vocab_type))]
    pub async fn fetch_vocabulary(&self, spec: &VocabularySpec) -> Result<Projection> {
        let start = Instant::now();
        let envelope = self.get("vocabulary/", &[("type", spec.vocab_type)]).await?;

        let mut projection: Projection = HashMap::new();
        for item in &envelope.data {
            let key = text(item, spec.key_field);
            if key.is_empty() {
                continue;
            }
            let fields = spec
                .fields
                .iter()
                .map(|(out, src)| (out.to_string(), text(item, src)))
                .collect();
            projection.insert(key, fields);
        }

        debug!(
            result_count = projection.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Registry vocabulary retrieved"
        );
        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_text_is_lenient() {
        let item = item(json!({
            "name": "La Jolla",
            "latitude": 32.85,
            "id": 41,
            "country_id3": null,
            "active": true
        }));
        assert_eq!(text(&item, "name"), "La Jolla");
        assert_eq!(text(&item, "latitude"), "32.85");
        assert_eq!(text(&item, "id"), "41");
        assert_eq!(text(&item, "country_id3"), "");
        assert_eq!(text(&item, "missing"), "");
        assert_eq!(text(&item, "active"), "true");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = RegistryClient::new("http://localhost:9/api/", RetryPolicy::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9/api");
    }

    #[test]
    fn test_envelope_without_data_is_empty() {
        let envelope: Envelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_empty());
    }
}
