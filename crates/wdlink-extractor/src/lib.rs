//! wdlink Extractor - Keyword extraction
//!
//! Turns document text into scored keywords for entity resolution:
//! - `StatisticalExtractor`: frequency-based 1..=N word keyphrases
//! - `DocumentExtractor`: chunks long documents and merges per-chunk
//!   keywords with occurrence counts
//!
//! Both implement `wdlink_core::KeywordExtractor`, so a model-backed
//! extractor can be plugged in instead.

pub mod document;
pub mod statistical;

pub use document::DocumentExtractor;
pub use statistical::StatisticalExtractor;
