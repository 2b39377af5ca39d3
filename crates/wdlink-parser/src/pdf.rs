//! PDF document parser using pdf-extract
//!
//! Extracts text from PDF files and cleans the usual extraction artifacts
//! (page breaks, words hyphenated across lines) before keyword extraction.

use std::path::Path;

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
pub struct PdfParser {
    /// Re-join words split by a hyphen at a line end
    pub join_hyphenated: bool,
}

impl PdfParser {
    /// Create a new PDF parser with default settings
    pub fn new() -> Self {
        Self {
            join_hyphenated: true,
        }
    }

    /// Toggle hyphenation repair
    pub fn with_hyphen_joining(mut self, enabled: bool) -> Self {
        self.join_hyphenated = enabled;
        self
    }

    /// Parse a PDF already loaded in memory (e.g. an upload)
    pub fn parse_bytes(&self, name: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let raw = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))?;

        // Form feeds separate pages in the extracted text
        let breaks = raw.matches('\x0C').count() as u32;
        let page_count = (breaks > 0).then_some(breaks + 1);

        let text = self.clean_text(&raw);
        tracing::debug!(
            name,
            chars = text.len(),
            pages = ?page_count,
            "extracted PDF text"
        );

        let mut doc = ParsedDocument::new(name, FileType::Pdf).with_content(text);
        doc.page_count = page_count;
        Ok(doc)
    }

    /// Remove page breaks and repair line-end hyphenation
    fn clean_text(&self, raw: &str) -> String {
        let text = raw.replace('\x0C', "\n");
        if !self.join_hyphenated {
            return text;
        }

        let mut out = String::with_capacity(text.len());
        let mut lines = text.lines().peekable();
        while let Some(line) = lines.next() {
            let trimmed = line.trim_end();
            let next_starts_lower = lines
                .peek()
                .and_then(|next| next.trim_start().chars().next())
                .map(|c| c.is_lowercase())
                .unwrap_or(false);

            match trimmed.strip_suffix('-') {
                Some(stem)
                    if next_starts_lower
                        && stem.chars().last().map(char::is_alphabetic).unwrap_or(false) =>
                {
                    out.push_str(stem);
                    if let Some(next) = lines.next() {
                        out.push_str(next.trim_start());
                        out.push('\n');
                    }
                }
                _ => {
                    out.push_str(trimmed);
                    out.push('\n');
                }
            }
        }
        out
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        self.parse_bytes(&path.display().to_string(), &bytes)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_parser_creation() {
        let parser = PdfParser::new();
        assert!(parser.join_hyphenated);

        let parser = parser.with_hyphen_joining(false);
        assert!(!parser.join_hyphenated);
    }

    #[test]
    fn test_hyphen_repair() {
        let parser = PdfParser::new();
        let cleaned = parser.clean_text("knowledge gra-\nphs are useful\x0CNext page");
        assert!(cleaned.contains("knowledge graphs are useful"));
        assert!(cleaned.contains("Next page"));
        assert!(!cleaned.contains('\x0C'));
    }

    #[test]
    fn test_hyphen_kept_before_capital() {
        let parser = PdfParser::new();
        let cleaned = parser.clean_text("Jean-\nPaul");
        assert!(cleaned.contains("Jean-\nPaul"));
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        let parser = PdfParser::new();
        let err = parser.parse_bytes("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, ParserError::PdfError(_)));
    }

    #[test]
    fn test_missing_file() {
        let parser = PdfParser::new();
        let err = parser.parse(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, ParserError::IoError { .. }));
    }

    #[test]
    fn test_supported_types() {
        let parser = PdfParser::new();
        assert!(parser.can_parse(FileType::Pdf));
        assert!(!parser.can_parse(FileType::PlainText));
    }
}
