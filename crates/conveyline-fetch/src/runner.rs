//! Raw-fetch orchestration: every query, one fresh output array

use std::path::PathBuf;
use std::time::{Duration, Instant};

use conveyline_core::{ArrayStart, ParcelRecord, ProgressContext, StreamingArrayWriter, fmt_num};

use crate::annotate::ErrorAnnotator;
use crate::api::{HttpSearchClient, SearchApi};
use crate::batch::{BatchFailure, BatchFetcher, BatchSink, QueryStats};
use crate::config::Config;

/// Result of one query
#[derive(Debug, Clone)]
pub struct QuerySummary {
    pub label: String,
    pub stats: QueryStats,
}

/// Fetch run summary
#[derive(Debug)]
pub struct Summary {
    pub output_path: PathBuf,
    pub queries: Vec<QuerySummary>,
    pub elapsed: Duration,
}

impl Summary {
    pub fn parcels_written(&self) -> usize {
        self.queries.iter().map(|q| q.stats.parcels).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.queries.iter().map(|q| q.stats.failed_batches).sum()
    }

    pub fn total_batches(&self) -> usize {
        self.queries.iter().map(|q| q.stats.batches).sum()
    }
}

/// Run the fetch pipeline against the configured HTTP endpoint
pub fn run(config: &Config, progress: &ProgressContext) -> anyhow::Result<Summary> {
    let client = HttpSearchClient::new(&config.base_url, &config.endpoint, config.token.as_deref());
    if config.token.is_none() {
        log::warn!("No API token configured, requests are unauthenticated");
    }
    log::info!("Search endpoint: {}", client.url());
    run_with(&client, config, progress)
}

/// Run the fetch pipeline against any [`SearchApi`].
///
/// The output file is truncated and framed once, then every query streams
/// into it. On a fatal error the array is still closed before returning.
pub fn run_with<A: SearchApi + ?Sized>(
    api: &A,
    config: &Config,
    progress: &ProgressContext,
) -> anyhow::Result<Summary> {
    config.validate()?;
    let start = Instant::now();

    let mut writer = StreamingArrayWriter::new(&config.output_path, ArrayStart::Fresh);
    writer.initialize()?;
    let annotator = ErrorAnnotator::new(config.annotations, &config.output_path);

    let result = fetch_queries(api, config, progress, &mut writer, &annotator);

    if let Err(e) = &result {
        log::error!("Fetch aborted: {e:#}");
        if let Err(note_err) = annotator.record(&mut writer, &format!("Fatal error: {e:#}")) {
            log::warn!("Could not record fatal error: {note_err:#}");
        }
    }
    let closed = writer.finalize();
    let queries = result?;
    closed?;

    let summary = Summary {
        output_path: config.output_path.clone(),
        queries,
        elapsed: start.elapsed(),
    };
    log::info!(
        "Wrote {} parcels to {} ({} of {} batches failed)",
        fmt_num(summary.parcels_written()),
        summary.output_path.display(),
        summary.failed_batches(),
        summary.total_batches()
    );
    Ok(summary)
}

fn fetch_queries<A: SearchApi + ?Sized>(
    api: &A,
    config: &Config,
    progress: &ProgressContext,
    writer: &mut StreamingArrayWriter,
    annotator: &ErrorAnnotator,
) -> anyhow::Result<Vec<QuerySummary>> {
    let fetcher = BatchFetcher::new(api, &config.predicate, config.batch_size);
    let mut summaries = Vec::with_capacity(config.queries.len());

    for query in &config.queries {
        log::info!(
            "Fetching {} (total: {})",
            query.label,
            fmt_num(query.total())
        );
        let pb = progress.count_bar(&query.label, query.total() as u64);

        let mut sink = ArraySink {
            writer: &mut *writer,
            annotator,
        };
        let stats = fetcher.fetch(query, &pb, &mut sink)?;
        pb.finish_and_clear();

        summaries.push(QuerySummary {
            label: query.label.clone(),
            stats,
        });
    }

    Ok(summaries)
}

/// Parcels become array elements, failures become annotations
struct ArraySink<'a> {
    writer: &'a mut StreamingArrayWriter,
    annotator: &'a ErrorAnnotator,
}

impl BatchSink for ArraySink<'_> {
    fn parcel(&mut self, parcel: ParcelRecord) -> anyhow::Result<()> {
        self.writer.append(&parcel)
    }

    fn failure(&mut self, failure: &BatchFailure) -> anyhow::Result<()> {
        for line in failure.messages() {
            self.annotator.record(self.writer, &line)?;
        }
        Ok(())
    }
}
