//! Linking pipeline
//!
//! The two operations exposed to the presentation layer:
//! - `process_document`: text -> keywords -> resolutions, with bounded
//!   concurrency and input order preserved
//! - `query_entity`: QID -> labelled relations
//!
//! Progress is published on a watch channel so a UI can follow a run.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;
use wdlink_core::{
    AppConfig, DocumentReport, EntitySearch, Keyword, KeywordExtractor, KeywordRow, LabelLookup,
    ProcessStatus, Qid, Relation, RelationSource, Result, RowOutcome, WdlinkError,
};
use wdlink_extractor::DocumentExtractor;
use wdlink_wikidata::{
    build_http_client, WikidataLabelClient, WikidataSearchClient, WikidataSparqlClient,
};

use crate::cache::ResolutionCache;
use crate::normalizer::RelationNormalizer;
use crate::resolver::EntityResolver;

/// Collaborators the pipeline is assembled from
pub struct PipelineParts {
    pub extractor: Arc<dyn KeywordExtractor>,
    pub search: Arc<dyn EntitySearch>,
    pub relations: Arc<dyn RelationSource>,
    pub labels: Arc<dyn LabelLookup>,
    pub cache: ResolutionCache,
}

/// Document -> entity linking pipeline
pub struct LinkingPipeline {
    extractor: Arc<dyn KeywordExtractor>,
    resolver: EntityResolver,
    relations: Arc<dyn RelationSource>,
    normalizer: RelationNormalizer,
    max_keywords: usize,
    max_concurrency: usize,
    status: watch::Sender<ProcessStatus>,
}

impl LinkingPipeline {
    pub fn new(parts: PipelineParts, config: &AppConfig) -> Self {
        let resolver = EntityResolver::new(
            parts.search,
            parts.cache,
            &config.resolver,
            config.wikidata.effective_search_limit(),
        );
        let normalizer = RelationNormalizer::new(parts.labels, config.wikidata.entity_base_url.clone());
        let (status, _) = watch::channel(ProcessStatus::Idle);

        Self {
            extractor: parts.extractor,
            resolver,
            relations: parts.relations,
            normalizer,
            max_keywords: config.extractor.max_keywords.max(1),
            max_concurrency: config.resolver.max_concurrency.max(1),
            status,
        }
    }

    /// Assemble the pipeline against the live Wikidata services.
    ///
    /// The three clients share one HTTP connection pool.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let client = build_http_client(&config.wikidata)?;
        let retry = config.retry.clone();
        let parts = PipelineParts {
            extractor: Arc::new(DocumentExtractor::from_config(&config.extractor)),
            search: Arc::new(WikidataSearchClient::with_client(
                client.clone(),
                &config.wikidata,
                retry.clone(),
            )),
            relations: Arc::new(WikidataSparqlClient::with_client(
                client.clone(),
                &config.wikidata,
                retry.clone(),
            )),
            labels: Arc::new(WikidataLabelClient::with_client(client, &config.wikidata, retry)),
            cache: ResolutionCache::from_config(&config.resolver),
        };

        Ok(Self::new(parts, config))
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Subscribe to run status updates
    pub fn status(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: ProcessStatus) {
        tracing::debug!(%status, "status changed");
        self.status.send_replace(status);
    }

    /// Extract keywords from `text` and resolve each of them.
    ///
    /// Per-keyword failures become `Failed` rows and do not stop the run.
    /// An extraction yielding nothing fails with `NoKeywordsExtracted`.
    /// On cancellation the report holds the rows finished so far, in input
    /// order, with status `Cancelled`.
    #[instrument(skip(self, text, cancel), fields(chars = text.len()))]
    pub async fn process_document(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<DocumentReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.set_status(ProcessStatus::Running {
            completed: 0,
            total: 0,
        });

        let keywords = match self.extractor.extract(text, self.max_keywords) {
            Ok(keywords) if keywords.is_empty() => {
                let err = WdlinkError::NoKeywordsExtracted;
                self.set_status(ProcessStatus::Failed {
                    reason: err.to_string(),
                });
                return Err(err);
            }
            Ok(keywords) => keywords,
            Err(e) => {
                self.set_status(ProcessStatus::Failed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let total = keywords.len();
        tracing::info!(%run_id, keywords = total, "resolving keywords");
        self.set_status(ProcessStatus::Running {
            completed: 0,
            total,
        });

        let mut slots: Vec<Option<KeywordRow>> = vec![None; total];
        let mut completed = 0usize;
        let mut cancelled = false;

        let resolutions = stream::iter(keywords.into_iter().enumerate())
            .map(|(index, keyword)| async move {
                let outcome = self.resolve_row(&keyword).await;
                (index, row(keyword, outcome))
            })
            .buffer_unordered(self.max_concurrency);
        let mut resolutions = std::pin::pin!(resolutions);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = resolutions.next() => match next {
                    Some((index, keyword_row)) => {
                        slots[index] = Some(keyword_row);
                        completed += 1;
                        self.set_status(ProcessStatus::Running { completed, total });
                    }
                    None => break,
                },
            }
        }

        let status = if cancelled {
            tracing::warn!(%run_id, completed, total, "document processing cancelled");
            ProcessStatus::Cancelled
        } else {
            ProcessStatus::Done
        };
        self.set_status(status.clone());

        let report = DocumentReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            rows: slots.into_iter().flatten().collect(),
        };
        tracing::info!(
            %run_id,
            resolved = report.resolved_count(),
            failed = report.failed_count(),
            "document processed"
        );
        Ok(report)
    }

    /// Resolve caller-supplied keywords one after another.
    ///
    /// Cancellation interrupts the keyword in flight; rows finished before
    /// that are returned.
    #[instrument(skip_all, fields(keywords = keywords.len()))]
    pub async fn resolve_keywords(
        &self,
        keywords: Vec<Keyword>,
        cancel: &CancellationToken,
    ) -> Vec<KeywordRow> {
        let mut rows = Vec::with_capacity(keywords.len());

        for keyword in keywords {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(completed = rows.len(), "keyword resolution cancelled");
                    break;
                }
                outcome = self.resolve_row(&keyword) => outcome,
            };
            rows.push(row(keyword, outcome));
        }

        rows
    }

    async fn resolve_row(&self, keyword: &Keyword) -> RowOutcome {
        match self.resolver.resolve(keyword).await {
            Ok(resolution) => RowOutcome::Resolved(resolution),
            Err(e) => {
                tracing::warn!(keyword = %keyword.normalized, error = %e, "keyword failed");
                RowOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Fetch and normalize every relation of an entity.
    ///
    /// A malformed ID fails with `InvalidEntityId` before any request.
    #[instrument(skip(self, cancel))]
    pub async fn query_entity(&self, qid: &str, cancel: &CancellationToken) -> Result<Vec<Relation>> {
        let qid = Qid::parse(qid)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WdlinkError::Cancelled),
            result = self.fetch_normalized(&qid) => result,
        }
    }

    async fn fetch_normalized(&self, qid: &Qid) -> Result<Vec<Relation>> {
        let raw = self.relations.fetch_relations(qid).await?;
        let fetched = raw.len();
        let relations = self.normalizer.normalize(raw).await;
        tracing::info!(%qid, fetched, relations = relations.len(), "entity relations ready");
        Ok(relations)
    }
}

fn row(keyword: Keyword, outcome: RowOutcome) -> KeywordRow {
    KeywordRow {
        keyword: keyword.text,
        normalized: keyword.normalized,
        score: keyword.score,
        occurrences: keyword.occurrences,
        outcome,
    }
}
