//! wdlink Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout wdlink:
//! - Keywords, search candidates and resolutions
//! - Wikidata identifiers and property relations
//! - The error taxonomy shared by every crate
//! - Collaborator traits (entity search, relation source, label lookup,
//!   keyword extraction) so backends can be swapped for in-memory stubs
//! - Configuration management

pub mod config;
pub mod ids;

pub use config::{
    AppConfig, ConfigError, ExtractorConfig, LoggingConfig, ResolverConfig, RetryConfig,
    WikidataConfig, MAX_SEARCH_LIMIT,
};
pub use ids::{PropertyId, Qid, ENTITY_URI_PREFIX};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Error taxonomy for wdlink operations
#[derive(Error, Debug)]
pub enum WdlinkError {
    #[error("Entity search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Property query unavailable: {0}")]
    QueryUnavailable(String),

    #[error("Invalid entity id: {0:?}")]
    InvalidEntityId(String),

    #[error("Invalid keyword: {0:?}")]
    InvalidKeyword(String),

    #[error("Resolution failed for {keyword:?}: {source}")]
    ResolutionFailed {
        keyword: String,
        #[source]
        source: Box<WdlinkError>,
    },

    #[error("No keywords were extracted from the document")]
    NoKeywordsExtracted,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WdlinkError>;

// ============================================================================
// Keywords
// ============================================================================

/// Normalize keyword text for comparison and caching.
///
/// Trims, lowercases (Unicode-aware) and collapses every whitespace run
/// into a single space, so `" PARIS "` and `"paris"` share one key.
pub fn normalize_keyword(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A keyword produced by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    /// Text as it appeared in the document
    pub text: String,

    /// Normalized comparison key
    pub normalized: String,

    /// Extractor relevance score (0.0 - 1.0)
    pub score: f32,

    /// Number of document chunks that produced this keyword
    pub occurrences: u32,
}

impl Keyword {
    /// Create a keyword, clamping the score into [0, 1]
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        let text = text.into();
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            normalized: normalize_keyword(&text),
            text,
            score,
            occurrences: 1,
        }
    }

    /// Set occurrence count
    pub fn with_occurrences(mut self, occurrences: u32) -> Self {
        self.occurrences = occurrences;
        self
    }
}

// ============================================================================
// Candidates and Resolutions
// ============================================================================

/// A possible entity match for a keyword, prior to disambiguation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub qid: Qid,
    pub label: String,
    pub description: Option<String>,

    /// Lexical relevance from the search service (0.0 - 1.0)
    pub match_score: f32,
}

impl Candidate {
    pub fn new(qid: Qid, label: impl Into<String>, match_score: f32) -> Self {
        Self {
            qid,
            label: label.into(),
            description: None,
            match_score,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when the candidate carries a non-blank description
    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Outcome of disambiguating one keyword to zero or one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Normalized keyword text
    pub keyword: String,

    /// Resolved entity, `None` when unresolved
    pub qid: Option<Qid>,

    /// Label of the chosen candidate
    pub label: Option<String>,

    /// Description of the chosen candidate
    pub description: Option<String>,

    /// Combined score of the chosen candidate
    pub score: Option<f32>,
}

impl Resolution {
    /// The unresolved marker for a keyword
    pub fn unresolved(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            qid: None,
            label: None,
            description: None,
            score: None,
        }
    }

    /// Resolution to a chosen candidate
    pub fn resolved(keyword: impl Into<String>, candidate: &Candidate, score: f32) -> Self {
        Self {
            keyword: keyword.into(),
            qid: Some(candidate.qid.clone()),
            label: Some(candidate.label.clone()),
            description: candidate.description.clone(),
            score: Some(score),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.qid.is_some()
    }
}

// ============================================================================
// Relations
// ============================================================================

/// Rank of a Wikidata statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementRank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

impl StatementRank {
    /// Parse a `wikibase:rank` URI
    pub fn from_uri(uri: &str) -> Self {
        match uri.rsplit('#').next() {
            Some("PreferredRank") => Self::Preferred,
            Some("DeprecatedRank") => Self::Deprecated,
            _ => Self::Normal,
        }
    }

    /// Higher is better
    fn weight(self) -> u8 {
        match self {
            Self::Preferred => 2,
            Self::Normal => 1,
            Self::Deprecated => 0,
        }
    }

    /// Return the better of two ranks
    pub fn best(self, other: Self) -> Self {
        if other.weight() > self.weight() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for StatementRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preferred => write!(f, "preferred"),
            Self::Normal => write!(f, "normal"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// Value side of a statement as returned by the query service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawValue {
    /// Another Wikidata item
    Entity { qid: Qid },
    /// A Wikidata property used as a value (e.g. on P1687 statements)
    Property { pid: PropertyId },
    /// A non-entity IRI (external URL, media file)
    Uri { value: String },
    /// A string, number, date or other literal
    Literal {
        value: String,
        datatype: Option<String>,
        lang: Option<String>,
    },
}

impl RawValue {
    /// Identity used for deduplication
    pub fn dedup_key(&self) -> String {
        match self {
            Self::Entity { qid } => format!("entity:{qid}"),
            Self::Property { pid } => format!("property:{pid}"),
            Self::Uri { value } => format!("uri:{value}"),
            Self::Literal {
                value,
                datatype,
                lang,
            } => format!(
                "literal:{value}^^{}@{}",
                datatype.as_deref().unwrap_or(""),
                lang.as_deref().unwrap_or("")
            ),
        }
    }
}

/// One property edge as fetched, before labels are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelation {
    pub subject: Qid,
    pub property: PropertyId,
    pub value: RawValue,
    pub rank: StatementRank,
    /// Unit of a quantity value
    pub unit: Option<Qid>,
}

impl RawRelation {
    pub fn new(subject: Qid, property: PropertyId, value: RawValue) -> Self {
        Self {
            subject,
            property,
            value,
            rank: StatementRank::Normal,
            unit: None,
        }
    }

    pub fn with_rank(mut self, rank: StatementRank) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_unit(mut self, unit: Qid) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// A labelled property edge ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub subject: Qid,
    pub property_id: PropertyId,
    pub property_label: String,
    pub value: RawValue,
    pub value_label: String,
    pub value_link: Option<String>,
    pub rank: StatementRank,
    pub unit: Option<String>,
}

// ============================================================================
// Document Processing Reports
// ============================================================================

/// Progress of a document-processing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ProcessStatus {
    #[default]
    Idle,
    Running {
        completed: usize,
        total: usize,
    },
    Done,
    Failed {
        reason: String,
    },
    Cancelled,
}

impl ProcessStatus {
    /// Whether the run has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Cancelled)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running { completed, total } => write!(f, "running ({completed}/{total})"),
            Self::Done => write!(f, "done"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-keyword result inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Resolved(Resolution),
    Failed { reason: String },
}

/// One row of the keyword table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRow {
    pub keyword: String,
    pub normalized: String,
    pub score: f32,
    pub occurrences: u32,
    pub outcome: RowOutcome,
}

impl KeywordRow {
    /// The resolution, if the keyword did not fail
    pub fn resolution(&self) -> Option<&Resolution> {
        match &self.outcome {
            RowOutcome::Resolved(resolution) => Some(resolution),
            RowOutcome::Failed { .. } => None,
        }
    }
}

/// Result of processing one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: ProcessStatus,
    pub rows: Vec<KeywordRow>,
}

impl DocumentReport {
    /// Number of rows resolved to an entity
    pub fn resolved_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.resolution().map(Resolution::is_resolved).unwrap_or(false))
            .count()
    }

    /// Number of rows that failed
    pub fn failed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, RowOutcome::Failed { .. }))
            .count()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Free-text entity search (e.g. `wbsearchentities`)
#[async_trait::async_trait]
pub trait EntitySearch: Send + Sync {
    /// Return candidates in the service's relevance order
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Candidate>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Source of outgoing property edges for an entity
#[async_trait::async_trait]
pub trait RelationSource: Send + Sync {
    async fn fetch_relations(&self, qid: &Qid) -> Result<Vec<RawRelation>>;
}

/// Batch label lookup for entity and property IDs
#[async_trait::async_trait]
pub trait LabelLookup: Send + Sync {
    /// Map each known ID to its label. Unknown IDs are simply absent.
    async fn labels(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}

/// Keyword extraction from plain text
pub trait KeywordExtractor: Send + Sync {
    fn extract(&self, text: &str, max_keywords: usize) -> Result<Vec<Keyword>>;
}

// ============================================================================
// Tests
// ============================================================================
