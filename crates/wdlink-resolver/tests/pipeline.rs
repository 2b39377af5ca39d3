//! End-to-end pipeline tests against in-memory collaborators

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wdlink_core::{
    AppConfig, Candidate, EntitySearch, Keyword, KeywordExtractor, LabelLookup, ProcessStatus,
    PropertyId, Qid, RawRelation, RawValue, RelationSource, Result, RowOutcome, WdlinkError,
};
use wdlink_resolver::{LinkingPipeline, PipelineParts, ResolutionCache};

// ============================================================================
// Stubs
// ============================================================================

/// Splits the document on commas; every keyword scores 0.8
struct CommaExtractor;

impl KeywordExtractor for CommaExtractor {
    fn extract(&self, text: &str, max_keywords: usize) -> Result<Vec<Keyword>> {
        Ok(text
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .take(max_keywords)
            .map(|part| Keyword::new(part.trim(), 0.8))
            .collect())
    }
}

/// Search stub with per-keyword latency and failures
#[derive(Default)]
struct StubSearch {
    results: HashMap<String, Vec<Candidate>>,
    delays_ms: HashMap<String, u64>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl StubSearch {
    fn with(mut self, keyword: &str, candidates: Vec<Candidate>) -> Self {
        self.results.insert(keyword.to_string(), candidates);
        self
    }

    fn delayed(mut self, keyword: &str, ms: u64) -> Self {
        self.delays_ms.insert(keyword.to_string(), ms);
        self
    }

    fn failing(mut self, keyword: &str) -> Self {
        self.failing.push(keyword.to_string());
        self
    }
}

#[async_trait]
impl EntitySearch for StubSearch {
    async fn search(&self, keyword: &str, _limit: usize) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = self.delays_ms.get(keyword) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.failing.iter().any(|k| k == keyword) {
            return Err(WdlinkError::SearchUnavailable("timed out".into()));
        }
        Ok(self.results.get(keyword).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[derive(Default)]
struct StubRelations {
    by_subject: HashMap<String, Vec<RawRelation>>,
    calls: AtomicUsize,
}

#[async_trait]
impl RelationSource for StubRelations {
    async fn fetch_relations(&self, qid: &Qid) -> Result<Vec<RawRelation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_subject.get(qid.as_str()).cloned().unwrap_or_default())
    }
}

/// Relation source that never answers
struct HangingRelations;

#[async_trait]
impl RelationSource for HangingRelations {
    async fn fetch_relations(&self, _qid: &Qid) -> Result<Vec<RawRelation>> {
        std::future::pending().await
    }
}

struct StubLabels(HashMap<String, String>);

#[async_trait]
impl LabelLookup for StubLabels {
    async fn labels(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.0.get(id).map(|l| (id.clone(), l.clone())))
            .collect())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn qid(id: &str) -> Qid {
    Qid::parse(id).unwrap()
}

fn candidate(id: &str, label: &str, score: f32) -> Candidate {
    Candidate::new(qid(id), label, score)
}

fn paris_relations() -> StubRelations {
    let p = |id: &str| PropertyId::parse(id).unwrap();
    let mut by_subject = HashMap::new();
    by_subject.insert(
        "Q90".to_string(),
        vec![
            RawRelation::new(qid("Q90"), p("P31"), RawValue::Entity { qid: qid("Q515") }),
            RawRelation::new(qid("Q90"), p("P17"), RawValue::Entity { qid: qid("Q142") }),
            RawRelation::new(qid("Q90"), p("P31"), RawValue::Entity { qid: qid("Q515") }),
            RawRelation::new(
                qid("Q90"),
                p("P1448"),
                RawValue::Literal {
                    value: "Paris".to_string(),
                    datatype: None,
                    lang: Some("fr".to_string()),
                },
            ),
        ],
    );
    StubRelations {
        by_subject,
        calls: AtomicUsize::new(0),
    }
}

fn labels() -> StubLabels {
    StubLabels(
        [
            ("P31", "instance of"),
            ("P17", "country"),
            ("P1448", "official name"),
            ("Q515", "city"),
            ("Q142", "France"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    )
}

fn pipeline(search: Arc<StubSearch>, relations: Arc<dyn RelationSource>) -> LinkingPipeline {
    let parts = PipelineParts {
        extractor: Arc::new(CommaExtractor),
        search,
        relations,
        labels: Arc::new(labels()),
        cache: ResolutionCache::new(),
    };
    LinkingPipeline::new(parts, &AppConfig::default())
}

// ============================================================================
// process_document
// ============================================================================

#[tokio::test]
async fn resolves_python_to_the_programming_language() {
    let search = Arc::new(StubSearch::default().with(
        "python",
        vec![
            candidate("Q28865", "Python", 0.4).with_description("genus of snakes"),
            candidate("Q812939", "Python", 0.9).with_description("programming language"),
        ],
    ));
    let pipeline = pipeline(search, Arc::new(StubRelations::default()));

    let report = pipeline
        .process_document("Python", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ProcessStatus::Done);
    let resolution = report.rows[0].resolution().unwrap();
    assert_eq!(resolution.qid.as_ref().unwrap().as_str(), "Q812939");
}

#[tokio::test]
async fn preserves_keyword_order_under_uneven_latency() {
    let search = Arc::new(
        StubSearch::default()
            .with("alpha", vec![candidate("Q1", "Alpha", 1.0)])
            .with("beta", vec![candidate("Q2", "Beta", 1.0)])
            .with("gamma", vec![candidate("Q3", "Gamma", 1.0)])
            .with("delta", vec![candidate("Q4", "Delta", 1.0)])
            .delayed("alpha", 120)
            .delayed("beta", 60)
            .delayed("gamma", 5),
    );
    let pipeline = pipeline(search, Arc::new(StubRelations::default()));

    let report = pipeline
        .process_document("alpha, beta, gamma, delta", &CancellationToken::new())
        .await
        .unwrap();

    let order: Vec<&str> = report.rows.iter().map(|r| r.normalized.as_str()).collect();
    assert_eq!(order, vec!["alpha", "beta", "gamma", "delta"]);
    let qids: Vec<String> = report
        .rows
        .iter()
        .map(|r| r.resolution().unwrap().qid.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(qids, vec!["Q1", "Q2", "Q3", "Q4"]);
}

#[tokio::test]
async fn failing_keyword_does_not_block_the_rest() {
    let search = Arc::new(
        StubSearch::default()
            .with("berlin", vec![candidate("Q64", "Berlin", 1.0)])
            .failing("atlantis"),
    );
    let pipeline = pipeline(search, Arc::new(StubRelations::default()));

    let report = pipeline
        .process_document("atlantis, berlin, qwzxv", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 3);
    assert!(matches!(report.rows[0].outcome, RowOutcome::Failed { .. }));
    assert!(report.rows[1].resolution().unwrap().is_resolved());
    // zero candidates is unresolved, not a failure
    let empty = report.rows[2].resolution().unwrap();
    assert!(!empty.is_resolved());
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.resolved_count(), 1);
}

#[tokio::test]
async fn repeated_keywords_hit_the_cache() {
    let search = Arc::new(StubSearch::default().with("rome", vec![candidate("Q220", "Rome", 1.0)]));
    let pipeline = pipeline(search.clone(), Arc::new(StubRelations::default()));
    let cancel = CancellationToken::new();

    let first = pipeline.process_document("Rome", &cancel).await.unwrap();
    let second = pipeline.process_document("  ROME ", &cancel).await.unwrap();

    assert_eq!(first.rows[0].resolution(), second.rows[0].resolution());
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_document_is_no_keywords_extracted() {
    let pipeline = pipeline(Arc::new(StubSearch::default()), Arc::new(StubRelations::default()));
    let status = pipeline.status();

    let err = pipeline
        .process_document(" , ,", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WdlinkError::NoKeywordsExtracted));
    assert!(matches!(*status.borrow(), ProcessStatus::Failed { .. }));
}

#[tokio::test]
async fn cancellation_keeps_completed_rows_in_order() {
    let search = Arc::new(
        StubSearch::default()
            .with("fast", vec![candidate("Q10", "Fast", 1.0)])
            .with("quick", vec![candidate("Q11", "Quick", 1.0)])
            .delayed("slow", 10_000),
    );
    let pipeline = Arc::new(pipeline(search, Arc::new(StubRelations::default())));
    let cancel = CancellationToken::new();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.process_document("slow, fast, quick", &cancel).await })
    };

    let mut status = pipeline.status();
    status
        .wait_for(|s| matches!(s, ProcessStatus::Running { completed: 2, .. }))
        .await
        .unwrap();
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancellation is prompt")
        .unwrap()
        .unwrap();

    assert_eq!(report.status, ProcessStatus::Cancelled);
    let kept: Vec<&str> = report.rows.iter().map(|r| r.normalized.as_str()).collect();
    assert_eq!(kept, vec!["fast", "quick"]);
    assert!(!pipeline.resolver().cache().contains("slow"));
    assert!(pipeline.resolver().cache().contains("fast"));
}

// ============================================================================
// resolve_keywords
// ============================================================================

#[tokio::test]
async fn resolve_keywords_keeps_input_order() {
    let search = Arc::new(
        StubSearch::default()
            .with("paris", vec![candidate("Q90", "Paris", 1.0)])
            .failing("berlin"),
    );
    let pipeline = pipeline(search, Arc::new(StubRelations::default()));

    let keywords = vec![Keyword::new("Paris", 1.0), Keyword::new("Berlin", 1.0)];
    let rows = pipeline
        .resolve_keywords(keywords, &CancellationToken::new())
        .await;

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].resolution().unwrap().qid, Some(qid("Q90")));
    assert!(matches!(rows[1].outcome, RowOutcome::Failed { .. }));
}

#[tokio::test]
async fn cancelling_resolve_keywords_interrupts_the_search_in_flight() {
    let search = Arc::new(
        StubSearch::default()
            .with("fast", vec![candidate("Q10", "Fast", 1.0)])
            .delayed("slow", 10_000),
    );
    let pipeline = pipeline(search.clone(), Arc::new(StubRelations::default()));
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let keywords = vec![
        Keyword::new("fast", 1.0),
        Keyword::new("slow", 1.0),
        Keyword::new("quick", 1.0),
    ];
    let rows = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.resolve_keywords(keywords, &cancel),
    )
    .await
    .expect("cancellation is prompt");

    let kept: Vec<&str> = rows.iter().map(|r| r.normalized.as_str()).collect();
    assert_eq!(kept, vec!["fast"]);
    // "quick" is never searched
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// query_entity
// ============================================================================

#[tokio::test]
async fn paris_relations_are_deduplicated_labelled_and_sorted() {
    let relations = Arc::new(paris_relations());
    let pipeline = pipeline(Arc::new(StubSearch::default()), relations);

    let rows = pipeline
        .query_entity("Q90", &CancellationToken::new())
        .await
        .unwrap();

    let table: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.property_label.as_str(), r.value_label.as_str()))
        .collect();
    assert_eq!(
        table,
        vec![
            ("country", "France"),
            ("instance of", "city"),
            ("official name", "Paris"),
        ]
    );
}

#[tokio::test]
async fn lowercase_qid_is_accepted() {
    let relations = Arc::new(paris_relations());
    let pipeline = pipeline(Arc::new(StubSearch::default()), relations.clone());

    let rows = pipeline
        .query_entity(" q90 ", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(relations.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_qid_fails_without_a_request() {
    let relations = Arc::new(paris_relations());
    let pipeline = pipeline(Arc::new(StubSearch::default()), relations.clone());

    for bad in ["", "Q", "Q0", "Q01", "P31", "Q12a", "python"] {
        let err = pipeline
            .query_entity(bad, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WdlinkError::InvalidEntityId(_)), "{bad}");
    }
    assert_eq!(relations.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn entity_without_statements_is_empty() {
    let pipeline = pipeline(Arc::new(StubSearch::default()), Arc::new(paris_relations()));
    let rows = pipeline
        .query_entity("Q4115189", &CancellationToken::new())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn query_entity_honours_cancellation() {
    let pipeline = pipeline(Arc::new(StubSearch::default()), Arc::new(HangingRelations));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.query_entity("Q90", &cancel).await.unwrap_err();
    assert!(matches!(err, WdlinkError::Cancelled));
}
