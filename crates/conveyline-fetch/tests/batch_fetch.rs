//! Batch fetching against a scripted in-memory search API

use std::cell::RefCell;
use std::collections::HashSet;

use conveyline_core::{
    FetchError, ParcelRecord, ProgressContext, SelectionPredicate, parse_array_text,
};
use conveyline_fetch::{
    AnnotationMode, BatchFailure, BatchFetcher, BatchSink, Config, QuerySpec, SearchApi,
    SearchRequest, SearchResponse, run_with,
};
use indicatif::ProgressBar;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Answers every request with one parcel per result slot, except offsets
/// listed in `fail_at`, which get an HTTP 500.
struct ScriptedApi {
    fail_at: HashSet<usize>,
    calls: RefCell<Vec<(usize, usize, String)>>,
}

impl ScriptedApi {
    fn new(fail_at: &[usize]) -> Self {
        Self {
            fail_at: fail_at.iter().copied().collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn offsets_and_limits(&self) -> Vec<(usize, usize)> {
        self.calls.borrow().iter().map(|(o, l, _)| (*o, *l)).collect()
    }
}

fn parcel_item(n: usize) -> Value {
    json!({
        "TaxMapKey": {
            "ParcelNumber": format!("{n:013}"),
            "LastSaleDate": "2024-05-01",
            "LastSalePrice": 450000,
            "LastSaleInstrument": "DEED",
            "Transfers": [
                {"Grantor": {
                    "Date": "2024-05-01T00:00:00-10:00",
                    "Price": 450000,
                    "InstrumentType": "DEED",
                    "BureauOfConveyancesLink": format!("https://boc.example/{n}.pdf")
                }},
                {"Grantor": {
                    "Date": "2018-05-01T00:00:00-10:00",
                    "Price": 150000,
                    "InstrumentType": "DEED",
                    "BureauOfConveyancesLink": "https://boc.example/old.pdf"
                }}
            ]
        }
    })
}

impl SearchApi for ScriptedApi {
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchResponse, FetchError> {
        self.calls.borrow_mut().push((
            request.offset,
            request.limit,
            request.query.to_string(),
        ));
        if self.fail_at.contains(&request.offset) {
            return Err(FetchError::Http {
                status: Some(500),
                message: "Internal Server Error".to_string(),
                body: Some("{\"error\":\"search backend unavailable\"}".to_string()),
            });
        }
        let items: Vec<Value> = (request.offset..request.offset + request.limit)
            .map(parcel_item)
            .chain(std::iter::once(json!({"NotATaxMapKey": {}})))
            .collect();
        Ok(SearchResponse {
            data: Some(items),
        })
    }
}

#[derive(Default)]
struct CollectingSink {
    parcels: Vec<ParcelRecord>,
    failures: Vec<usize>,
}

impl BatchSink for CollectingSink {
    fn parcel(&mut self, parcel: ParcelRecord) -> anyhow::Result<()> {
        self.parcels.push(parcel);
        Ok(())
    }

    fn failure(&mut self, failure: &BatchFailure) -> anyhow::Result<()> {
        self.failures.push(failure.batch.offset);
        Ok(())
    }
}

fn query(start: usize, end: usize) -> QuerySpec {
    QuerySpec {
        label: "test".to_string(),
        query: "TaxMapKey.LastSaleInstrument: \"DEED\"".to_string(),
        start,
        end,
    }
}

#[test]
fn issues_one_request_per_batch_with_short_tail() {
    let api = ScriptedApi::new(&[]);
    let predicate = SelectionPredicate::default();
    let fetcher = BatchFetcher::new(&api, &predicate, 1000);
    let mut sink = CollectingSink::default();

    let stats = fetcher
        .fetch(&query(0, 2500), &ProgressBar::hidden(), &mut sink)
        .unwrap();

    assert_eq!(
        api.offsets_and_limits(),
        vec![(0, 1000), (1000, 1000), (2000, 500)]
    );
    assert_eq!(stats.batches, 3);
    assert_eq!(stats.ok_batches, 3);
    assert_eq!(stats.parcels, 2500);
    // one qualifying transfer per parcel, the 2018 sale is dropped
    assert_eq!(stats.transfers, 2500);
    // the item without a TaxMapKey is skipped
    assert_eq!(stats.items, 2503);
    assert!(sink.parcels.iter().all(|p| p.transfers().len() == 1));
}

#[test]
fn failed_batch_does_not_stop_later_batches() {
    let api = ScriptedApi::new(&[1000]);
    let predicate = SelectionPredicate::default();
    let fetcher = BatchFetcher::new(&api, &predicate, 1000);
    let mut sink = CollectingSink::default();

    let stats = fetcher
        .fetch(&query(0, 2500), &ProgressBar::hidden(), &mut sink)
        .unwrap();

    assert_eq!(api.calls.borrow().len(), 3);
    assert_eq!(sink.failures, vec![1000]);
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.ok_batches, 2);
    assert_eq!(sink.parcels.len(), 1500);
    assert_eq!(
        sink.parcels.last().unwrap().parcel_number_str(),
        Some("0000000002499")
    );
}

#[test]
fn sink_error_aborts_fetch() {
    struct FailingSink;
    impl BatchSink for FailingSink {
        fn parcel(&mut self, _: ParcelRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        fn failure(&mut self, _: &BatchFailure) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let api = ScriptedApi::new(&[]);
    let predicate = SelectionPredicate::default();
    let fetcher = BatchFetcher::new(&api, &predicate, 10);
    let err = fetcher
        .fetch(&query(0, 30), &ProgressBar::hidden(), &mut FailingSink)
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert_eq!(api.calls.borrow().len(), 1);
}

fn config(dir: &TempDir, queries: Vec<QuerySpec>, annotations: AnnotationMode) -> Config {
    Config {
        batch_size: 1000,
        queries,
        output_path: dir.path().join("housing_data.json"),
        annotations,
        ..Default::default()
    }
}

#[test]
fn run_writes_surviving_batches_and_inline_annotations() {
    let dir = TempDir::new().unwrap();
    let api = ScriptedApi::new(&[1000]);
    let config = config(&dir, vec![query(0, 2500)], AnnotationMode::Inline);

    let summary = run_with(&api, &config, &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.parcels_written(), 1500);
    assert_eq!(summary.failed_batches(), 1);

    let text = std::fs::read_to_string(&config.output_path).unwrap();
    assert!(text.contains("// ERROR: Error making request at offset 1000: HTTP 500"));
    assert!(text.contains("// ERROR: Error response: {\"error\":\"search backend unavailable\"}"));

    let (records, framing) = parse_array_text(&text).unwrap();
    assert_eq!(framing, conveyline_core::Framing::Closed);
    assert_eq!(records.len(), 1500);
    // the batch at offset 2000 made it to disk
    assert!(records
        .iter()
        .any(|r| r["ParcelNumber"] == json!("0000000002000")));
}

#[test]
fn run_with_sidecar_keeps_strict_json() {
    let dir = TempDir::new().unwrap();
    let api = ScriptedApi::new(&[0]);
    let config = config(&dir, vec![query(0, 1500)], AnnotationMode::Sidecar);

    run_with(&api, &config, &ProgressContext::hidden()).unwrap();

    let text = std::fs::read_to_string(&config.output_path).unwrap();
    let records: Vec<Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(records.len(), 500);
    let side = std::fs::read_to_string(dir.path().join("housing_data.json.errors.log")).unwrap();
    assert!(side.starts_with("ERROR: Error making request at offset 0"));
}

#[test]
fn run_streams_all_queries_into_one_array() {
    let dir = TempDir::new().unwrap();
    let api = ScriptedApi::new(&[]);
    let mut second = query(0, 20);
    second.label = "second".to_string();
    second.query = "other".to_string();
    let config = config(&dir, vec![query(0, 30), second], AnnotationMode::Inline);

    let summary = run_with(&api, &config, &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.queries.len(), 2);
    assert_eq!(summary.parcels_written(), 50);

    let records: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
    assert_eq!(records.len(), 50);
    let queries: Vec<String> = api.calls.borrow().iter().map(|c| c.2.clone()).collect();
    assert_eq!(queries.last().map(String::as_str), Some("other"));
}

#[test]
fn run_truncates_previous_output() {
    let dir = TempDir::new().unwrap();
    let api = ScriptedApi::new(&[]);
    let config = config(&dir, vec![query(0, 5)], AnnotationMode::Inline);
    std::fs::write(&config.output_path, "[{\"stale\": true}]").unwrap();

    run_with(&api, &config, &ProgressContext::hidden()).unwrap();
    let records: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.get("stale").is_none()));
}

#[test]
fn run_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let api = ScriptedApi::new(&[]);
    let mut config = config(&dir, vec![query(0, 5)], AnnotationMode::Inline);
    config.batch_size = 0;
    assert!(run_with(&api, &config, &ProgressContext::hidden()).is_err());
    assert!(api.calls.borrow().is_empty());
    assert!(!config.output_path.exists());
}

/// Replaces the output file with a directory before answering the second
/// request, so the next append cannot open it.
struct OutputVanishingApi {
    inner: ScriptedApi,
    output: std::path::PathBuf,
}

impl SearchApi for OutputVanishingApi {
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchResponse, FetchError> {
        if self.inner.calls.borrow().len() == 1 {
            std::fs::remove_file(&self.output)?;
            std::fs::create_dir(&self.output)?;
        }
        self.inner.search(request)
    }
}

#[test]
fn run_records_fatal_error_when_output_becomes_unwritable() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, vec![query(0, 30)], AnnotationMode::Sidecar);
    config.batch_size = 10;
    let api = OutputVanishingApi {
        inner: ScriptedApi::new(&[]),
        output: config.output_path.clone(),
    };

    let err = run_with(&api, &config, &ProgressContext::hidden()).unwrap_err();
    assert!(format!("{err:#}").contains("Cannot open"));
    // the run stopped at the batch whose parcels could not be written
    assert_eq!(api.inner.calls.borrow().len(), 2);

    let side = std::fs::read_to_string(dir.path().join("housing_data.json.errors.log")).unwrap();
    let fatal: Vec<&str> = side
        .lines()
        .filter(|l| l.starts_with("ERROR: Fatal error:"))
        .collect();
    assert_eq!(fatal.len(), 1);
    assert!(fatal[0].contains("Cannot open"));
}
