//! Batched label lookup
//!
//! Resolves item and property IDs to human-readable labels with
//! `wbgetentities`. The service accepts at most 50 IDs per call, so lookups
//! are split into batches that run concurrently.
//!
//! Author: hephaex@gmail.com

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use wdlink_core::{LabelLookup, Result, RetryConfig, WdlinkError, WikidataConfig};

use crate::retry::retry_request;
use crate::{build_http_client, fetch_text, language_chain, RequestError};

/// Maximum IDs per `wbgetentities` call
pub const LABEL_BATCH_SIZE: usize = 50;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, EntityLabels>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct EntityLabels {
    #[serde(default)]
    labels: HashMap<String, LabelValue>,
    missing: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    info: Option<String>,
}

/// Parse a `wbgetentities` body, picking the first available language of
/// `languages` for each entity. Missing entities and entities without a
/// label in any of those languages are left out.
pub(crate) fn parse_labels_response(
    body: &str,
    languages: &[String],
) -> std::result::Result<HashMap<String, String>, RequestError> {
    let response: EntitiesResponse = serde_json::from_str(body)
        .map_err(|e| RequestError::Permanent(format!("Malformed entities response: {e}")))?;

    if let Some(err) = response.error {
        return Err(RequestError::Permanent(format!(
            "Entities API error {}: {}",
            err.code.unwrap_or_default(),
            err.info.unwrap_or_default()
        )));
    }

    let labels = response
        .entities
        .into_iter()
        .filter(|(_, entity)| entity.missing.is_none())
        .filter_map(|(id, mut entity)| {
            languages
                .iter()
                .find_map(|lang| entity.labels.remove(lang))
                .map(|label| (id, label.value))
        })
        .collect();

    Ok(labels)
}

// ============================================================================
// Label Client
// ============================================================================

/// `wbgetentities` label client
pub struct WikidataLabelClient {
    client: Client,
    api_url: String,
    languages: Vec<String>,
    retry: RetryConfig,
}

impl WikidataLabelClient {
    /// Create a new label client
    pub fn new(config: &WikidataConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?, config, retry))
    }

    /// Create a client sharing an existing HTTP connection pool
    pub fn with_client(client: Client, config: &WikidataConfig, retry: RetryConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            languages: language_chain(&config.language),
            retry,
        }
    }

    async fn fetch_batch(
        &self,
        ids: &str,
    ) -> std::result::Result<HashMap<String, String>, RequestError> {
        let languages = self.languages.join("|");
        let request = self.client.get(&self.api_url).query(&[
            ("action", "wbgetentities"),
            ("ids", ids),
            ("props", "labels"),
            ("languages", languages.as_str()),
            ("format", "json"),
        ]);

        let body = fetch_text(request).await?;
        parse_labels_response(&body, &self.languages)
    }
}

#[async_trait]
impl LabelLookup for WikidataLabelClient {
    async fn labels(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let distinct: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if distinct.is_empty() {
            return Ok(HashMap::new());
        }

        let batches: Vec<String> = distinct
            .chunks(LABEL_BATCH_SIZE)
            .map(|chunk| chunk.join("|"))
            .collect();

        let results = join_all(batches.iter().map(|batch| {
            retry_request(&self.retry, "wbgetentities", move || self.fetch_batch(batch))
        }))
        .await;

        let mut labels = HashMap::with_capacity(distinct.len());
        let mut last_error = None;
        let mut failed = 0usize;
        for result in results {
            match result {
                Ok(batch_labels) => labels.extend(batch_labels),
                Err(e) => {
                    tracing::warn!(error = %e, "label batch failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if failed == batches.len() {
            if let Some(e) = last_error {
                return Err(WdlinkError::QueryUnavailable(e.to_string()));
            }
        }

        tracing::debug!(
            requested = distinct.len(),
            labelled = labels.len(),
            batches = batches.len(),
            "labels fetched"
        );
        Ok(labels)
    }
}
