//! Conveyline Fetch - paginated retrieval of parcel records
//!
//! Pages through the tax-map-key search API in fixed-size batches, keeps
//! qualifying transfers, and streams parcel records into a fresh array file.
//! A failed batch is annotated and skipped; it never aborts the run.

pub mod annotate;
pub mod api;
pub mod batch;
pub mod config;
pub mod runner;

// Re-exports
pub use annotate::{AnnotationMode, ErrorAnnotator};
pub use api::{HttpSearchClient, SearchApi, SearchRequest, SearchResponse};
pub use batch::{Batch, BatchFailure, BatchFetcher, BatchSink, QueryStats, plan_batches};
pub use config::{Config, QuerySpec};
pub use runner::{QuerySummary, Summary, run, run_with};
