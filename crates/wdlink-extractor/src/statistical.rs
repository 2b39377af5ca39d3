//! Statistical keyphrase extraction
//!
//! Candidate keyphrases are contiguous 1..=N word runs that neither start
//! nor end with a stopword and never cross punctuation. Candidates are
//! scored by frequency with a boost for longer phrases, and sub-phrases of
//! an already selected keyphrase are skipped so the result stays diverse.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use wdlink_core::{Keyword, KeywordExtractor, Result, WdlinkError};

/// Word tokens: letters and digits with inner apostrophes or hyphens
static TOKEN_PATTERN: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’\-]*"));

fn token_pattern() -> Result<&'static Regex> {
    TOKEN_PATTERN
        .as_ref()
        .map_err(|e| WdlinkError::DocumentError(format!("Invalid token pattern: {e}")))
}

/// Common English function words never allowed at a phrase boundary
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "etc",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "may", "me", "might", "more", "most", "must", "my", "no", "nor", "not", "now", "of", "off",
    "on", "once", "one", "only", "or", "other", "our", "ours", "out", "over", "own", "same",
    "shall", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "then", "there", "these", "they", "this", "those", "through", "thus", "to", "too",
    "under", "until", "up", "upon", "us", "used", "using", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "within", "without",
    "would", "you", "your", "yours",
];

/// Characters that end a phrase run
const PHRASE_BREAKS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '“', '”', '/', '|',
];

/// Score boost per extra word in a phrase
const NGRAM_BOOST: f32 = 0.5;

#[derive(Debug)]
struct Token<'a> {
    surface: &'a str,
    lower: String,
}

#[derive(Debug)]
struct CandidateStats {
    surface: String,
    count: u32,
    first_pos: usize,
    words: usize,
}

/// Frequency-based n-gram keyword extractor
pub struct StatisticalExtractor {
    /// Longest phrase in words
    max_ngram: usize,
    /// Shortest single-word keyword in characters
    min_word_chars: usize,
}

impl StatisticalExtractor {
    /// Create an extractor producing 1..=3 word phrases
    pub fn new() -> Self {
        Self {
            max_ngram: 3,
            min_word_chars: 3,
        }
    }

    /// Set the longest phrase length
    pub fn with_max_ngram(mut self, n: usize) -> Self {
        self.max_ngram = n.max(1);
        self
    }

    fn is_stopword(word: &str) -> bool {
        STOPWORDS.binary_search(&word).is_ok()
    }

    /// Split text into punctuation-free runs of tokens
    fn segments(text: &str) -> Result<Vec<Vec<Token<'_>>>> {
        let mut segments = Vec::new();
        let mut current: Vec<Token<'_>> = Vec::new();
        let mut last_end = 0;

        for mat in token_pattern()?.find_iter(text) {
            let gap = &text[last_end..mat.start()];
            if gap.contains(PHRASE_BREAKS) && !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            last_end = mat.end();

            let surface = mat.as_str().trim_end_matches(['-', '\'', '’']);
            if surface.is_empty() {
                continue;
            }
            current.push(Token {
                surface,
                lower: surface.to_lowercase(),
            });
        }
        if !current.is_empty() {
            segments.push(current);
        }
        Ok(segments)
    }

    /// Whether a token window is an acceptable keyphrase
    fn accept(&self, window: &[Token<'_>]) -> bool {
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return false;
        };
        if Self::is_stopword(&first.lower) || Self::is_stopword(&last.lower) {
            return false;
        }
        if window
            .iter()
            .all(|t| t.lower.chars().all(|c| !c.is_alphabetic()))
        {
            return false;
        }
        if window.len() == 1 && first.lower.chars().count() < self.min_word_chars {
            return false;
        }
        true
    }

    fn collect_candidates(&self, text: &str) -> Result<HashMap<String, CandidateStats>> {
        let mut candidates: HashMap<String, CandidateStats> = HashMap::new();
        let mut position = 0usize;

        for segment in Self::segments(text)? {
            for start in 0..segment.len() {
                for n in 1..=self.max_ngram.min(segment.len() - start) {
                    let window = &segment[start..start + n];
                    if !self.accept(window) {
                        continue;
                    }
                    let key = window
                        .iter()
                        .map(|t| t.lower.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    candidates
                        .entry(key)
                        .and_modify(|c| c.count += 1)
                        .or_insert_with(|| CandidateStats {
                            surface: window
                                .iter()
                                .map(|t| t.surface)
                                .collect::<Vec<_>>()
                                .join(" "),
                            count: 1,
                            first_pos: position,
                            words: n,
                        });
                }
                position += 1;
            }
        }
        Ok(candidates)
    }
}

impl Default for StatisticalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordExtractor for StatisticalExtractor {
    fn extract(&self, text: &str, max_keywords: usize) -> Result<Vec<Keyword>> {
        if max_keywords == 0 {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(String, CandidateStats, f32)> = self
            .collect_candidates(text)?
            .into_iter()
            .map(|(key, stats)| {
                let score = stats.count as f32 * (1.0 + NGRAM_BOOST * (stats.words - 1) as f32);
                (key, stats, score)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then(a.1.first_pos.cmp(&b.1.first_pos))
                .then(a.0.cmp(&b.0))
        });

        let top_score = ranked.first().map(|r| r.2).unwrap_or(1.0);
        let mut selected: Vec<(String, Keyword)> = Vec::new();

        for (key, stats, score) in ranked {
            if selected.len() >= max_keywords {
                break;
            }
            let padded = format!(" {key} ");
            let subsumed = selected
                .iter()
                .any(|(sel, _)| format!(" {sel} ").contains(&padded));
            if subsumed {
                continue;
            }
            selected.push((key, Keyword::new(stats.surface, score / top_score)));
        }

        Ok(selected.into_iter().map(|(_, kw)| kw).collect())
    }
}
