//! Relation normalizer
//!
//! Turns raw statements into display-ready relations: duplicates are merged,
//! every property, item and unit ID is labelled through one batched lookup,
//! and the result is sorted for stable output.
//!
//! Author: hephaex@gmail.com

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use wdlink_core::{LabelLookup, RawRelation, RawValue, Relation};

/// Labels raw relations and orders them for display
pub struct RelationNormalizer {
    labels: Arc<dyn LabelLookup>,
    entity_base_url: String,
}

impl RelationNormalizer {
    pub fn new(labels: Arc<dyn LabelLookup>, entity_base_url: impl Into<String>) -> Self {
        Self {
            labels,
            entity_base_url: entity_base_url.into(),
        }
    }

    /// Normalize raw relations into a deduplicated, labelled, sorted list.
    ///
    /// Never fails: a label lookup error degrades every label to its raw ID.
    pub async fn normalize(&self, raw: Vec<RawRelation>) -> Vec<Relation> {
        let deduped = dedupe(raw);
        if deduped.is_empty() {
            return Vec::new();
        }

        let ids = label_ids(&deduped);
        let labels = match self.labels.labels(&ids).await {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!(error = %e, ids = ids.len(), "label lookup failed, showing raw IDs");
                HashMap::new()
            }
        };
        let label_of = |id: &str| labels.get(id).cloned().unwrap_or_else(|| id.to_string());

        let mut relations: Vec<Relation> = deduped
            .into_iter()
            .map(|raw| {
                let (value_label, value_link) = match &raw.value {
                    RawValue::Entity { qid } => {
                        (label_of(qid.as_str()), Some(qid.page_url(&self.entity_base_url)))
                    }
                    RawValue::Property { pid } => {
                        (label_of(pid.as_str()), Some(pid.page_url(&self.entity_base_url)))
                    }
                    RawValue::Uri { value } => (value.clone(), Some(value.clone())),
                    RawValue::Literal { value, .. } => (value.clone(), None),
                };

                Relation {
                    property_label: label_of(raw.property.as_str()),
                    unit: raw.unit.as_ref().map(|unit| label_of(unit.as_str())),
                    subject: raw.subject,
                    property_id: raw.property,
                    value: raw.value,
                    value_label,
                    value_link,
                    rank: raw.rank,
                }
            })
            .collect();

        relations.sort_by(|a, b| {
            a.property_label
                .cmp(&b.property_label)
                .then_with(|| a.value_label.cmp(&b.value_label))
                .then_with(|| a.property_id.as_str().cmp(b.property_id.as_str()))
                .then_with(|| a.value.dedup_key().cmp(&b.value.dedup_key()))
        });

        relations
    }
}

/// Merge relations sharing (property, value, unit), keeping first-seen
/// order. The merged relation carries the best rank.
fn dedupe(raw: Vec<RawRelation>) -> Vec<RawRelation> {
    let mut index: HashMap<(String, String, Option<String>), usize> = HashMap::new();
    let mut out: Vec<RawRelation> = Vec::with_capacity(raw.len());

    for relation in raw {
        let key = (
            relation.property.to_string(),
            relation.value.dedup_key(),
            relation.unit.as_ref().map(|unit| unit.to_string()),
        );
        match index.get(&key) {
            Some(&i) => {
                let kept = &mut out[i];
                kept.rank = kept.rank.best(relation.rank);
            }
            None => {
                index.insert(key, out.len());
                out.push(relation);
            }
        }
    }

    out
}

/// Distinct IDs needing a label: properties, item and property values, units
fn label_ids(relations: &[RawRelation]) -> Vec<String> {
    let mut ids: BTreeSet<String> = BTreeSet::new();
    for relation in relations {
        ids.insert(relation.property.to_string());
        match &relation.value {
            RawValue::Entity { qid } => {
                ids.insert(qid.to_string());
            }
            RawValue::Property { pid } => {
                ids.insert(pid.to_string());
            }
            RawValue::Uri { .. } | RawValue::Literal { .. } => {}
        }
        if let Some(unit) = &relation.unit {
            ids.insert(unit.to_string());
        }
    }
    ids.into_iter().collect()
}
