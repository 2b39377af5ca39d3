//! Wikidata identifiers
//!
//! Entities (`Q42`) and properties (`P31`) are weak references into
//! Wikidata. They are validated once at the boundary and carried as
//! newtypes afterwards.

use serde::{Deserialize, Serialize};

use crate::{Result, WdlinkError};

/// Prefix of concept URIs returned by the query service
pub const ENTITY_URI_PREFIX: &str = "http://www.wikidata.org/entity/";

/// Validate `<prefix><digits>` without a leading zero.
fn is_valid_id(s: &str, prefix: char) -> bool {
    let mut chars = s.chars();
    if chars.next() != Some(prefix) {
        return false;
    }
    let digits = chars.as_str();
    !digits.is_empty()
        && !digits.starts_with('0')
        && digits.chars().all(|c| c.is_ascii_digit())
}

/// Canonicalize user input: trim and upper-case a lowercase prefix.
fn canonical(raw: &str, prefix: char) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(c) if c == prefix.to_ascii_lowercase() => format!("{prefix}{}", chars.as_str()),
        _ => trimmed.to_string(),
    }
}

// ============================================================================
// Entity ID
// ============================================================================

/// A Wikidata item identifier such as `Q812939`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Qid(String);

impl Qid {
    /// Parse and validate a QID. Fails with `InvalidEntityId` on anything
    /// that does not match `Q[1-9][0-9]*`.
    pub fn parse(raw: &str) -> Result<Self> {
        let id = canonical(raw, 'Q');
        if is_valid_id(&id, 'Q') {
            Ok(Self(id))
        } else {
            Err(WdlinkError::InvalidEntityId(raw.to_string()))
        }
    }

    /// Extract a QID from a concept URI (`http://www.wikidata.org/entity/Q42`)
    pub fn from_entity_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(ENTITY_URI_PREFIX)
            .filter(|id| is_valid_id(id, 'Q'))
            .map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-facing page for this entity
    pub fn page_url(&self, base_url: &str) -> String {
        format!("{base_url}{}", self.0)
    }
}

impl std::fmt::Display for Qid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Qid {
    type Err = WdlinkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Qid {
    type Error = WdlinkError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Qid> for String {
    fn from(value: Qid) -> Self {
        value.0
    }
}

// ============================================================================
// Property ID
// ============================================================================

/// A Wikidata property identifier such as `P31`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyId(String);

impl PropertyId {
    pub fn parse(raw: &str) -> Result<Self> {
        let id = canonical(raw, 'P');
        if is_valid_id(&id, 'P') {
            Ok(Self(id))
        } else {
            Err(WdlinkError::InvalidEntityId(raw.to_string()))
        }
    }

    /// Extract a property ID from a concept URI
    pub fn from_entity_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(ENTITY_URI_PREFIX)
            .filter(|id| is_valid_id(id, 'P'))
            .map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Property pages live in the `Property:` namespace
    pub fn page_url(&self, base_url: &str) -> String {
        format!("{base_url}Property:{}", self.0)
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PropertyId {
    type Error = WdlinkError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PropertyId> for String {
    fn from(value: PropertyId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qid_parse_valid() {
        assert_eq!(Qid::parse("Q812939").unwrap().as_str(), "Q812939");
        assert_eq!(Qid::parse("  q42 ").unwrap().as_str(), "Q42");
    }

    #[test]
    fn test_qid_parse_rejects_malformed() {
        for bad in ["", "Q", "Q0", "Q012", "P31", "Q12a", "42", "Q-1", "QQ1"] {
            let err = Qid::parse(bad).unwrap_err();
            assert!(
                matches!(err, WdlinkError::InvalidEntityId(_)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_qid_from_entity_uri() {
        let qid = Qid::from_entity_uri("http://www.wikidata.org/entity/Q90").unwrap();
        assert_eq!(qid.as_str(), "Q90");
        assert!(Qid::from_entity_uri("http://www.wikidata.org/entity/P31").is_none());
        assert!(Qid::from_entity_uri("https://example.org/Q90").is_none());
    }

    #[test]
    fn test_property_id() {
        assert_eq!(PropertyId::parse("p31").unwrap().as_str(), "P31");
        assert!(PropertyId::parse("Q31").is_err());
        let pid = PropertyId::from_entity_uri("http://www.wikidata.org/entity/P569").unwrap();
        assert_eq!(pid.to_string(), "P569");
    }

    #[test]
    fn test_qid_serde_validates() {
        let qid: Qid = serde_json::from_str("\"Q5\"").unwrap();
        assert_eq!(qid.as_str(), "Q5");
        assert!(serde_json::from_str::<Qid>("\"X5\"").is_err());
        assert_eq!(serde_json::to_string(&qid).unwrap(), "\"Q5\"");
    }

    #[test]
    fn test_property_page_url() {
        let pid = PropertyId::parse("P31").unwrap();
        assert_eq!(
            pid.page_url("https://www.wikidata.org/wiki/"),
            "https://www.wikidata.org/wiki/Property:P31"
        );
    }

    #[test]
    fn test_page_url() {
        let qid = Qid::parse("Q42").unwrap();
        assert_eq!(
            qid.page_url("https://www.wikidata.org/wiki/"),
            "https://www.wikidata.org/wiki/Q42"
        );
    }
}
