//! Batch planning and the sequential batch fetcher

use indicatif::ProgressBar;

use conveyline_core::{FetchError, ParcelRecord, SelectionPredicate, fmt_num};

use crate::api::{SearchApi, SearchRequest};
use crate::config::QuerySpec;

/// One page request: `limit` results starting at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub offset: usize,
    pub limit: usize,
}

/// Split `[start, end)` into `ceil((end - start) / batch_size)` batches.
///
/// The last batch is shortened so nothing past `end` is requested.
pub fn plan_batches(start: usize, end: usize, batch_size: usize) -> Vec<Batch> {
    if batch_size == 0 || end <= start {
        return Vec::new();
    }
    (start..end)
        .step_by(batch_size)
        .map(|offset| Batch {
            offset,
            limit: batch_size.min(end - offset),
        })
        .collect()
}

/// A batch whose request failed
#[derive(Debug)]
pub struct BatchFailure {
    pub batch: Batch,
    pub error: FetchError,
}

impl BatchFailure {
    /// Annotation lines describing the failure, response body last
    pub fn messages(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Error making request at offset {}: {}",
            self.batch.offset, self.error
        )];
        if let Some(body) = self.error.response_body() {
            lines.push(format!("Error response: {body}"));
        }
        lines
    }
}

/// Counters for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub batches: usize,
    pub ok_batches: usize,
    pub failed_batches: usize,
    /// Items in `data` across successful batches
    pub items: usize,
    /// Parcel records handed to the caller
    pub parcels: usize,
    /// Qualifying transfers across those parcels
    pub transfers: usize,
}

/// Receives the output of a [`BatchFetcher`] run
pub trait BatchSink {
    /// A projected parcel from a successful batch
    fn parcel(&mut self, parcel: ParcelRecord) -> anyhow::Result<()>;
    /// A batch whose request failed; fetching continues afterwards
    fn failure(&mut self, failure: &BatchFailure) -> anyhow::Result<()>;
}

/// Pages through one query at a time, strictly in order.
pub struct BatchFetcher<'a, A: SearchApi + ?Sized> {
    api: &'a A,
    predicate: &'a SelectionPredicate,
    batch_size: usize,
}

impl<'a, A: SearchApi + ?Sized> BatchFetcher<'a, A> {
    pub fn new(api: &'a A, predicate: &'a SelectionPredicate, batch_size: usize) -> Self {
        Self {
            api,
            predicate,
            batch_size,
        }
    }

    /// Fetch every batch of `query`.
    ///
    /// A failed request is handed to the sink and the next batch is fetched
    /// regardless. Only errors returned by the sink stop the run.
    pub fn fetch(
        &self,
        query: &QuerySpec,
        pb: &ProgressBar,
        sink: &mut impl BatchSink,
    ) -> anyhow::Result<QueryStats> {
        let batches = plan_batches(query.start, query.end, self.batch_size);
        let mut stats = QueryStats {
            batches: batches.len(),
            ..Default::default()
        };
        log::debug!(
            "{}: {} batches of up to {} over [{}, {})",
            query.label,
            batches.len(),
            self.batch_size,
            query.start,
            query.end
        );

        for batch in batches {
            let request = SearchRequest::new(&query.query, batch.offset, batch.limit);
            match self.api.search(&request) {
                Ok(response) => {
                    let parcels: Vec<ParcelRecord> = response
                        .items()
                        .iter()
                        .filter_map(|item| item.get("TaxMapKey"))
                        .map(|tmk| ParcelRecord::project(tmk, self.predicate))
                        .collect();

                    stats.items += response.items().len();
                    for parcel in parcels {
                        stats.parcels += 1;
                        stats.transfers += parcel.transfers().len();
                        sink.parcel(parcel)?;
                    }
                    stats.ok_batches += 1;

                    let fetched = batch.offset + batch.limit;
                    pb.set_position((fetched - query.start) as u64);
                    log::info!(
                        "{}: fetched {} of {} results",
                        query.label,
                        fmt_num(fetched),
                        fmt_num(query.end)
                    );
                }
                Err(error) => {
                    stats.failed_batches += 1;
                    pb.inc(batch.limit as u64);
                    log::error!(
                        "{}: request at offset {} failed: {error}",
                        query.label,
                        batch.offset
                    );
                    sink.failure(&BatchFailure { batch, error })?;
                }
            }
        }

        Ok(stats)
    }
}
