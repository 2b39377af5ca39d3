//! SPARQL relation client
//!
//! Fetches every outgoing statement of an item from the Wikidata Query
//! Service, with statement rank and quantity unit.
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use wdlink_core::{
    PropertyId, Qid, RawRelation, RawValue, RelationSource, Result, RetryConfig, StatementRank,
    WdlinkError, WikidataConfig,
};

use crate::retry::retry_request;
use crate::{build_http_client, fetch_text, RequestError};

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Skolemized IRIs used for "some value" / "no value" statements
const GENID_PREFIX: &str = "http://www.wikidata.org/.well-known/genid/";

/// Unit item `1`, meaning a dimensionless quantity
const DIMENSIONLESS_UNIT: &str = "Q199";

// ============================================================================
// Query
// ============================================================================

/// Build the query selecting all statements of `qid`.
pub fn relations_query(qid: &Qid) -> String {
    format!(
        r#"PREFIX wd: <http://www.wikidata.org/entity/>
PREFIX wikibase: <http://wikiba.se/ontology#>

SELECT ?property ?value ?rank ?unit
WHERE {{
  wd:{qid} ?claim ?statement .
  ?statement ?statementProperty ?value ;
             wikibase:rank ?rank .
  ?property wikibase:claim ?claim ;
            wikibase:statementProperty ?statementProperty .
  OPTIONAL {{
    ?property wikibase:statementValue ?statementValue .
    ?statement ?statementValue ?valueNode .
    ?valueNode wikibase:quantityUnit ?unit .
  }}
}}
"#
    )
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    datatype: Option<String>,
    #[serde(rename = "xml:lang")]
    lang: Option<String>,
}

impl SparqlTerm {
    fn into_value(self) -> Option<RawValue> {
        match self.kind.as_str() {
            "uri" => {
                if self.value.starts_with(GENID_PREFIX) {
                    return None;
                }
                if let Some(qid) = Qid::from_entity_uri(&self.value) {
                    return Some(RawValue::Entity { qid });
                }
                Some(match PropertyId::from_entity_uri(&self.value) {
                    Some(pid) => RawValue::Property { pid },
                    None => RawValue::Uri { value: self.value },
                })
            }
            "literal" | "typed-literal" => Some(RawValue::Literal {
                value: self.value,
                datatype: self.datatype,
                lang: self.lang,
            }),
            // blank nodes carry no value
            _ => None,
        }
    }
}

/// Parse SPARQL JSON results into raw relations of `subject`.
pub(crate) fn parse_sparql_response(
    subject: &Qid,
    body: &str,
) -> std::result::Result<Vec<RawRelation>, RequestError> {
    let response: SparqlResponse = serde_json::from_str(body)
        .map_err(|e| RequestError::Permanent(format!("Malformed SPARQL response: {e}")))?;

    let mut relations = Vec::with_capacity(response.results.bindings.len());
    for mut binding in response.results.bindings {
        let Some(property) = binding
            .remove("property")
            .and_then(|term| PropertyId::from_entity_uri(&term.value))
        else {
            continue;
        };
        let Some(value) = binding.remove("value").and_then(SparqlTerm::into_value) else {
            continue;
        };

        let mut relation = RawRelation::new(subject.clone(), property, value);
        if let Some(rank) = binding.remove("rank") {
            relation = relation.with_rank(StatementRank::from_uri(&rank.value));
        }
        if let Some(unit) = binding
            .remove("unit")
            .and_then(|term| Qid::from_entity_uri(&term.value))
            .filter(|unit| unit.as_str() != DIMENSIONLESS_UNIT)
        {
            relation = relation.with_unit(unit);
        }
        relations.push(relation);
    }

    Ok(relations)
}

// ============================================================================
// SPARQL Client
// ============================================================================

/// Wikidata Query Service client
pub struct WikidataSparqlClient {
    client: Client,
    endpoint: String,
    retry: RetryConfig,
}

impl WikidataSparqlClient {
    /// Create a new SPARQL client
    pub fn new(config: &WikidataConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?, config, retry))
    }

    /// Create a client sharing an existing HTTP connection pool
    pub fn with_client(client: Client, config: &WikidataConfig, retry: RetryConfig) -> Self {
        Self {
            client,
            endpoint: config.sparql_url.clone(),
            retry,
        }
    }

    async fn query_once(
        &self,
        qid: &Qid,
        query: &str,
    ) -> std::result::Result<Vec<RawRelation>, RequestError> {
        let request = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .query(&[("query", query)]);

        let body = fetch_text(request).await?;
        parse_sparql_response(qid, &body)
    }
}

#[async_trait]
impl RelationSource for WikidataSparqlClient {
    async fn fetch_relations(&self, qid: &Qid) -> Result<Vec<RawRelation>> {
        let query = relations_query(qid);

        let relations = retry_request(&self.retry, "sparql", || self.query_once(qid, &query))
            .await
            .map_err(|e| WdlinkError::QueryUnavailable(e.to_string()))?;

        tracing::debug!(qid = %qid, count = relations.len(), "relations fetched");
        Ok(relations)
    }
}
