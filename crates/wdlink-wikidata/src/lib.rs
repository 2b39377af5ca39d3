//! wdlink Wikidata - Remote knowledge-base clients
//!
//! Implements the collaborator traits from `wdlink-core` against the public
//! Wikidata services:
//! - `WikidataSearchClient`: `wbsearchentities` free-text entity search
//! - `WikidataSparqlClient`: SPARQL query for every outgoing statement
//! - `WikidataLabelClient`: batched `wbgetentities` label lookup
//!
//! Every call has a bounded timeout and runs under the configured retry
//! policy.
//!
//! Author: hephaex@gmail.com

use reqwest::{Client, RequestBuilder, StatusCode};
use wdlink_core::{Result, WdlinkError, WikidataConfig};

pub mod labels;
mod retry;
pub mod search;
pub mod sparql;

pub use labels::WikidataLabelClient;
pub use search::WikidataSearchClient;
pub use sparql::WikidataSparqlClient;

// ============================================================================
// Request Errors
// ============================================================================

/// Failure of a single HTTP attempt, classified for the retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RequestError {
    /// Timeouts, connection failures, HTTP 429 and 5xx
    Transient(String),
    /// Other 4xx, API errors, malformed bodies
    Permanent(String),
}

impl RequestError {
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Permanent(msg) => msg,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Permanent(format!("Failed to decode response: {e}"))
        } else if e.is_timeout() {
            Self::Transient(format!("Request timed out: {e}"))
        } else {
            Self::Transient(format!("Request failed: {e}"))
        }
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        let msg = format!("HTTP {status}: {snippet}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(msg)
        } else {
            Self::Permanent(msg)
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// ============================================================================
// HTTP Helpers
// ============================================================================

/// Build the shared HTTP client (timeout and User-Agent applied to every call)
pub fn build_http_client(config: &WikidataConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| WdlinkError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

/// Send a request and return the body of a 2xx response
pub(crate) async fn fetch_text(request: RequestBuilder) -> std::result::Result<String, RequestError> {
    let response = request.send().await.map_err(RequestError::from_reqwest)?;
    let status = response.status();
    let body = response.text().await.map_err(RequestError::from_reqwest)?;

    if !status.is_success() {
        return Err(RequestError::from_status(status, &body));
    }
    Ok(body)
}

/// Language priority list: configured language, then English
pub(crate) fn language_chain(language: &str) -> Vec<String> {
    let mut chain = vec![language.trim().to_lowercase()];
    if chain[0] != "en" {
        chain.push("en".to_string());
    }
    chain.retain(|l| !l.is_empty());
    if chain.is_empty() {
        chain.push("en".to_string());
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(RequestError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(RequestError::from_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!RequestError::from_status(StatusCode::BAD_REQUEST, "bad").is_transient());
        assert!(!RequestError::from_status(StatusCode::NOT_FOUND, "").is_transient());
    }

    #[test]
    fn test_status_message_truncated() {
        let body = "x".repeat(1000);
        let err = RequestError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.message().len() < 300);
        assert!(err.message().starts_with("HTTP 500"));
    }

    /// Listener that accepts connections and never answers
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out_as_transient() {
        let config = WikidataConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let client = build_http_client(&config).unwrap();
        let url = silent_server().await;

        let err = fetch_text(client.get(&url)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.message().starts_with("Request timed out"), "{err}");
    }

    #[test]
    fn test_language_chain() {
        assert_eq!(language_chain("en"), vec!["en"]);
        assert_eq!(language_chain("DE"), vec!["de", "en"]);
        assert_eq!(language_chain(" "), vec!["en"]);
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&WikidataConfig::default()).is_ok());
    }
}
