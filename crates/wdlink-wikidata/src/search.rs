//! Entity search client
//!
//! Free-text search over Wikidata items via the `wbsearchentities` action.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use wdlink_core::{
    normalize_keyword, Candidate, EntitySearch, Qid, Result, RetryConfig, WdlinkError,
    WikidataConfig, MAX_SEARCH_LIMIT,
};

use crate::retry::retry_request;
use crate::{build_http_client, fetch_text, RequestError};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    label: Option<String>,
    description: Option<String>,
    #[serde(rename = "match")]
    matched: Option<MatchInfo>,
}

#[derive(Debug, Deserialize)]
struct MatchInfo {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    info: Option<String>,
}

/// Parse a `wbsearchentities` body into ranked candidates.
///
/// The service only returns an ordering, so the candidate at position `i`
/// of `n` gets a match score of `(n - i) / n`.
pub(crate) fn parse_search_response(body: &str) -> std::result::Result<Vec<Candidate>, RequestError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| RequestError::Permanent(format!("Malformed search response: {e}")))?;

    if let Some(err) = response.error {
        return Err(RequestError::Permanent(format!(
            "Search API error {}: {}",
            err.code.unwrap_or_default(),
            err.info.unwrap_or_default()
        )));
    }

    let total = response.search.len();
    let candidates = response
        .search
        .into_iter()
        .enumerate()
        .filter_map(|(position, hit)| {
            let qid = match Qid::parse(&hit.id) {
                Ok(qid) => qid,
                Err(_) => {
                    tracing::debug!(id = %hit.id, "skipping non-item search hit");
                    return None;
                }
            };
            let label = hit
                .label
                .or_else(|| hit.matched.and_then(|m| m.text))
                .unwrap_or_else(|| qid.to_string());
            let match_score = (total - position) as f32 / total as f32;

            let mut candidate = Candidate::new(qid, label, match_score);
            if let Some(description) = hit.description.filter(|d| !d.trim().is_empty()) {
                candidate = candidate.with_description(description);
            }
            Some(candidate)
        })
        .collect();

    Ok(candidates)
}

// ============================================================================
// Search Client
// ============================================================================

/// `wbsearchentities` client
pub struct WikidataSearchClient {
    client: Client,
    api_url: String,
    language: String,
    retry: RetryConfig,
}

impl WikidataSearchClient {
    /// Create a new search client
    pub fn new(config: &WikidataConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?, config, retry))
    }

    /// Create a client sharing an existing HTTP connection pool
    pub fn with_client(client: Client, config: &WikidataConfig, retry: RetryConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            language: config.language.clone(),
            retry,
        }
    }

    async fn search_once(
        &self,
        keyword: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Candidate>, RequestError> {
        let limit = limit.to_string();
        let request = self.client.get(&self.api_url).query(&[
            ("action", "wbsearchentities"),
            ("search", keyword),
            ("language", self.language.as_str()),
            ("uselang", self.language.as_str()),
            ("type", "item"),
            ("limit", limit.as_str()),
            ("format", "json"),
        ]);

        let body = fetch_text(request).await?;
        parse_search_response(&body)
    }
}

#[async_trait]
impl EntitySearch for WikidataSearchClient {
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Candidate>> {
        let normalized = normalize_keyword(keyword);
        if normalized.is_empty() {
            return Err(WdlinkError::InvalidKeyword(keyword.to_string()));
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);

        let candidates = retry_request(&self.retry, "wbsearchentities", || {
            self.search_once(&normalized, limit)
        })
        .await
        .map_err(|e| WdlinkError::SearchUnavailable(e.to_string()))?;

        tracing::debug!(keyword = %normalized, count = candidates.len(), "entity search done");
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "wikidata"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_FIXTURE: &str = r#"{
        "searchinfo": {"search": "python programming language"},
        "search": [
            {"id": "Q28865", "label": "Python", "description": "general-purpose programming language",
             "match": {"type": "label", "language": "en", "text": "Python"}},
            {"id": "Q812939", "label": "Python programming language",
             "match": {"type": "alias", "language": "en", "text": "Python programming language"}},
            {"id": "Q271218", "description": "genus of reptiles",
             "match": {"type": "alias", "language": "en", "text": "python"}},
            {"id": "L12345", "label": "python"}
        ],
        "success": 1
    }"#;

    #[test]
    fn test_parse_rank_derived_scores() {
        let candidates = parse_search_response(PYTHON_FIXTURE).unwrap();
        assert_eq!(candidates.len(), 3);

        assert_eq!(candidates[0].qid.as_str(), "Q28865");
        assert_eq!(candidates[0].match_score, 1.0);
        assert_eq!(candidates[1].match_score, 0.75);
        assert_eq!(candidates[2].match_score, 0.5);
    }

    #[test]
    fn test_parse_label_fallbacks() {
        let candidates = parse_search_response(PYTHON_FIXTURE).unwrap();
        assert_eq!(candidates[1].description, None);
        // missing label falls back to the matched text
        assert_eq!(candidates[2].label, "python");
        assert!(candidates[2].has_description());
    }

    #[test]
    fn test_parse_empty_result() {
        let body = r#"{"searchinfo": {"search": "zzzz"}, "search": [], "success": 1}"#;
        assert!(parse_search_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_api_error_is_permanent() {
        let body = r#"{"error": {"code": "param-missing", "info": "The search parameter must be set."}}"#;
        let err = parse_search_response(body).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message().contains("param-missing"));
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_search_response("<html>").unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_keyword_rejected_without_request() {
        let client = WikidataSearchClient::new(&WikidataConfig::default(), RetryConfig::default())
            .unwrap();
        let err = client.search("  \t ", 5).await.unwrap_err();
        assert!(matches!(err, WdlinkError::InvalidKeyword(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_search_unavailable() {
        let config = WikidataConfig {
            api_url: "http://127.0.0.1:9/w/api.php".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let retry = RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
        };
        let client = WikidataSearchClient::new(&config, retry).unwrap();

        let err = client.search("Paris", 5).await.unwrap_err();
        assert!(matches!(err, WdlinkError::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_search_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let config = WikidataConfig {
            api_url: format!("http://{addr}/w/api.php"),
            timeout_secs: 1,
            ..Default::default()
        };
        let retry = RetryConfig {
            max_retries: 1,
            base_delay_ms: 1,
        };
        let client = WikidataSearchClient::new(&config, retry).unwrap();

        let started = std::time::Instant::now();
        let err = client.search("Paris", 5).await.unwrap_err();
        assert!(matches!(err, WdlinkError::SearchUnavailable(ref msg) if msg.contains("timed out")));
        // one retry after the first timeout, then give up
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
