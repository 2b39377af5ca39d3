//! wdlink Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults that talk to the public Wikidata endpoints.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Wikidata endpoints and request settings
    pub wikidata: WikidataConfig,

    /// Disambiguation policy and concurrency
    pub resolver: ResolverConfig,

    /// Retry policy wrapped around every remote call
    pub retry: RetryConfig,

    /// Keyword extraction settings
    pub extractor: ExtractorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Wikidata
        if let Ok(url) = std::env::var("WDLINK_API_URL") {
            self.wikidata.api_url = url;
        }
        if let Ok(url) = std::env::var("WDLINK_SPARQL_URL") {
            self.wikidata.sparql_url = url;
        }
        if let Ok(language) = std::env::var("WDLINK_LANGUAGE") {
            self.wikidata.language = language;
        }
        if let Ok(agent) = std::env::var("WDLINK_USER_AGENT") {
            self.wikidata.user_agent = agent;
        }
        if let Some(secs) = env_parse("WDLINK_TIMEOUT_SECS")? {
            self.wikidata.timeout_secs = secs;
        }
        if let Some(limit) = env_parse("WDLINK_SEARCH_LIMIT")? {
            self.wikidata.search_limit = limit;
        }

        // Resolver
        if let Some(weight) = env_parse("WDLINK_RANK_WEIGHT")? {
            self.resolver.rank_weight = weight;
        }
        if let Some(weight) = env_parse("WDLINK_EXTRACTOR_WEIGHT")? {
            self.resolver.extractor_weight = weight;
        }
        if let Some(n) = env_parse("WDLINK_MAX_CONCURRENCY")? {
            self.resolver.max_concurrency = n;
        }

        // Retry
        if let Some(n) = env_parse("WDLINK_MAX_RETRIES")? {
            self.retry.max_retries = n;
        }
        if let Some(ms) = env_parse("WDLINK_RETRY_BASE_DELAY_MS")? {
            self.retry.base_delay_ms = ms;
        }

        // Extractor
        if let Some(n) = env_parse("WDLINK_MAX_KEYWORDS")? {
            self.extractor.max_keywords = n;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_parse("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(self)
    }

    /// Reject settings the resolver cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.resolver;
        if r.rank_weight < 0.0 || r.extractor_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "resolver weights".to_string(),
                value: format!("{}/{}", r.rank_weight, r.extractor_weight),
            });
        }
        if r.rank_weight + r.extractor_weight <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "resolver weights".to_string(),
                value: "both zero".to_string(),
            });
        }
        if r.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "resolver.max_concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        if self.extractor.chunk_words == 0 {
            return Err(ConfigError::InvalidValue {
                key: "extractor.chunk_words".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse an optional environment variable
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Upper bound on search results per keyword
pub const MAX_SEARCH_LIMIT: usize = 10;

/// Wikidata endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    /// MediaWiki action API (`wbsearchentities`, `wbgetentities`)
    pub api_url: String,

    /// SPARQL query service
    pub sparql_url: String,

    /// Base URL for human-facing entity pages
    pub entity_base_url: String,

    /// Search and label language (English is always the fallback)
    pub language: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Candidates requested per keyword
    pub search_limit: usize,
}

impl WikidataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Search limit clamped to 1..=MAX_SEARCH_LIMIT
    pub fn effective_search_limit(&self) -> usize {
        self.search_limit.clamp(1, MAX_SEARCH_LIMIT)
    }
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.wikidata.org/w/api.php".to_string(),
            sparql_url: "https://query.wikidata.org/sparql".to_string(),
            entity_base_url: "https://www.wikidata.org/wiki/".to_string(),
            language: "en".to_string(),
            user_agent: concat!(
                "wdlink/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/hephaex/wdlink)"
            )
            .to_string(),
            timeout_secs: 30,
            search_limit: 5,
        }
    }
}

/// Disambiguation and batch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Weight of the search service's lexical match score
    pub rank_weight: f32,

    /// Weight of the extractor's confidence
    pub extractor_weight: f32,

    /// Combined scores below this leave the keyword unresolved
    pub min_combined_score: f32,

    /// Keywords resolved in parallel
    pub max_concurrency: usize,

    /// Optional bound on cached resolutions (unbounded when unset)
    pub cache_max_capacity: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            rank_weight: 1.0,
            extractor_weight: 1.0,
            min_combined_score: 0.0,
            max_concurrency: 4,
            cache_max_capacity: None,
        }
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    /// Delay before retry `attempt` (1-based): `base_delay_ms * 2^(attempt - 1)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(1 << (attempt - 1).min(10)),
        )
    }
}

/// Keyword extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Words per document chunk
    pub chunk_words: usize,

    /// Keywords taken from each chunk
    pub keywords_per_chunk: usize,

    /// Longest keyphrase in words
    pub max_ngram: usize,

    /// Distinct keywords kept per document
    pub max_keywords: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            chunk_words: 500,
            keywords_per_chunk: 5,
            max_ngram: 3,
            max_keywords: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for crate::WdlinkError {
    fn from(e: ConfigError) -> Self {
        crate::WdlinkError::ConfigError(e.to_string())
    }
}
