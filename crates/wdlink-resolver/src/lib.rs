//! wdlink Resolver - Keyword-to-entity resolution pipeline
//!
//! This crate holds the decision logic of wdlink:
//! - `EntityResolver`: candidate ranking and deterministic disambiguation
//! - `ResolutionCache`: process-wide, first-writer-wins keyword memoization
//! - `RelationNormalizer`: dedup, batched labelling and stable ordering
//! - `LinkingPipeline`: the `process_document` / `query_entity` operations
//!
//! Remote services are reached only through the traits of `wdlink-core`,
//! so every part can run against in-memory stubs.
//!
//! Author: hephaex@gmail.com

pub mod cache;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;

pub use cache::{CacheStatsReport, ResolutionCache};
pub use normalizer::RelationNormalizer;
pub use pipeline::{LinkingPipeline, PipelineParts};
pub use resolver::{EntityResolver, ScoringPolicy};
