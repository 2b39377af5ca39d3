//! Document-level keyword extraction
//!
//! Long documents are split into word windows; each window contributes its
//! top keywords and the results are merged by normalized text. A keyword's
//! occurrence count is the number of windows that produced it and its score
//! is the best score it reached in any window.

use std::collections::HashMap;
use std::sync::Arc;

use wdlink_core::{ExtractorConfig, Keyword, KeywordExtractor, Result};
use wdlink_parser::chunk_words;

use crate::StatisticalExtractor;

/// Chunking wrapper around a per-window keyword extractor
pub struct DocumentExtractor {
    inner: Arc<dyn KeywordExtractor>,
    chunk_words: usize,
    keywords_per_chunk: usize,
}

impl DocumentExtractor {
    pub fn new(inner: Arc<dyn KeywordExtractor>, config: &ExtractorConfig) -> Self {
        Self {
            inner,
            chunk_words: config.chunk_words.max(1),
            keywords_per_chunk: config.keywords_per_chunk.max(1),
        }
    }

    /// Statistical extractor configured from `config`
    pub fn from_config(config: &ExtractorConfig) -> Self {
        let inner = StatisticalExtractor::new().with_max_ngram(config.max_ngram);
        Self::new(Arc::new(inner), config)
    }
}

impl KeywordExtractor for DocumentExtractor {
    fn extract(&self, text: &str, max_keywords: usize) -> Result<Vec<Keyword>> {
        let chunks = chunk_words(text, self.chunk_words);
        tracing::debug!(chunks = chunks.len(), "extracting keywords per chunk");

        // normalized text -> (first-seen index, merged keyword)
        let mut merged: HashMap<String, (usize, Keyword)> = HashMap::new();

        for chunk in &chunks {
            for keyword in self.inner.extract(chunk, self.keywords_per_chunk)? {
                if keyword.normalized.is_empty() {
                    continue;
                }
                let next_index = merged.len();
                merged
                    .entry(keyword.normalized.clone())
                    .and_modify(|(_, existing)| {
                        existing.occurrences += keyword.occurrences;
                        existing.score = existing.score.max(keyword.score);
                    })
                    .or_insert((next_index, keyword));
            }
        }

        let mut keywords: Vec<(usize, Keyword)> = merged.into_values().collect();

        // Keep the most frequent keywords when over the cap
        if keywords.len() > max_keywords {
            keywords.sort_by(|(ia, a), (ib, b)| {
                b.occurrences
                    .cmp(&a.occurrences)
                    .then(b.score.total_cmp(&a.score))
                    .then(ia.cmp(ib))
            });
            keywords.truncate(max_keywords);
        }

        keywords.sort_by_key(|(index, _)| *index);
        Ok(keywords.into_iter().map(|(_, kw)| kw).collect())
    }
}
