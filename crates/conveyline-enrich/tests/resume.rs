//! Resumable enrichment runs against a recording tax extractor

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use conveyline_core::{ProgressContext, parse_array_text};
use conveyline_enrich::{Config, TaxExtractor, TaxOutcome, run_with};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Returns a fixed amount and remembers every document it was asked about
#[derive(Default)]
struct RecordingExtractor {
    calls: RefCell<Vec<String>>,
}

impl TaxExtractor for RecordingExtractor {
    fn extract(&self, document_url: &str) -> TaxOutcome {
        self.calls.borrow_mut().push(document_url.to_string());
        if document_url.ends_with("missing.pdf") {
            TaxOutcome::NotFound
        } else {
            TaxOutcome::Amount("1,234.50".to_string())
        }
    }
}

impl RecordingExtractor {
    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

fn transfer(date: &str, price: u64, link: &str) -> Value {
    json!({"Grantor": {
        "Date": date,
        "Price": price,
        "InstrumentType": "DEED",
        "BureauOfConveyancesLink": link
    }})
}

fn parcel(number: &str, transfers: Vec<Value>) -> Value {
    json!({
        "ParcelNumber": number,
        "LastSaleDate": null,
        "LastSalePrice": null,
        "LastSaleInstrument": null,
        "Transfers": transfers
    })
}

fn parcels(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| {
            parcel(
                &format!("1234567890{i:03}"),
                vec![transfer(
                    "2024-04-01T00:00:00-10:00",
                    300_000 + i as u64,
                    &format!("https://boc.example/{i}.pdf"),
                )],
            )
        })
        .collect()
}

struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("housing_data.json");
        let output = dir.path().join("processed_transfers.json");
        Self {
            _dir: dir,
            input,
            output,
        }
    }

    fn write_input(&self, entries: &[Value]) {
        fs::write(&self.input, serde_json::to_string_pretty(entries).unwrap()).unwrap();
    }

    fn config(&self) -> Config {
        Config {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            ..Config::default()
        }
    }

    fn output_text(&self) -> String {
        fs::read_to_string(&self.output).unwrap()
    }

    /// Output parsed by a strict JSON parser
    fn output_records(&self) -> Vec<Value> {
        serde_json::from_str(&self.output_text()).unwrap()
    }
}

#[test]
fn fresh_run_writes_enriched_records() {
    let ws = Workspace::new();
    ws.write_input(&parcels(3));
    let extractor = RecordingExtractor::default();

    let summary = run_with(&extractor, &ws.config(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.existing, 0);
    assert_eq!(summary.added, 3);
    assert_eq!(summary.parcels, 3);
    assert_eq!(extractor.call_count(), 3);

    let records = ws.output_records();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records[0],
        json!({
            "ParcelNumber": "1234567890001",
            "TMK": "1-2-3-456-789-1",
            "Date": "2024-04-01T00:00:00-10:00",
            "Price": 300001,
            "BureauOfConveyancesLink": "https://boc.example/1.pdf",
            "ConveyanceTax": "1,234.50"
        })
    );
}

#[test]
fn rerun_with_same_input_changes_nothing() {
    let ws = Workspace::new();
    ws.write_input(&parcels(3));
    run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();
    let before = ws.output_text();

    let extractor = RecordingExtractor::default();
    let summary = run_with(&extractor, &ws.config(), &ProgressContext::hidden()).unwrap();

    assert_eq!(summary.existing, 3);
    assert_eq!(summary.added, 0);
    assert_eq!(summary.duplicates, 3);
    assert_eq!(extractor.call_count(), 0);
    assert_eq!(ws.output_text(), before);
}

#[test]
fn rerun_with_more_input_appends_only_new_records() {
    let ws = Workspace::new();
    ws.write_input(&parcels(2));
    run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();
    let before = ws.output_text();

    ws.write_input(&parcels(5));
    let extractor = RecordingExtractor::default();
    let summary = run_with(&extractor, &ws.config(), &ProgressContext::hidden()).unwrap();

    assert_eq!(summary.existing, 2);
    assert_eq!(summary.added, 3);
    assert_eq!(extractor.call_count(), 3);
    assert_eq!(
        *extractor.calls.borrow(),
        vec![
            "https://boc.example/3.pdf",
            "https://boc.example/4.pdf",
            "https://boc.example/5.pdf"
        ]
    );

    let after = ws.output_text();
    let old_body = before.strip_suffix("\n]\n").unwrap();
    assert!(after.starts_with(old_body));
    assert_eq!(ws.output_records().len(), 5);
}

#[test]
fn duplicate_within_one_run_is_written_once() {
    let ws = Workspace::new();
    let deed = transfer("2024-07-04T00:00:00-10:00", 500_000, "https://boc.example/dup.pdf");
    ws.write_input(&[
        parcel("1234567890000", vec![deed.clone(), deed.clone()]),
        parcel("1234567890000", vec![deed]),
    ]);
    let extractor = RecordingExtractor::default();

    let summary = run_with(&extractor, &ws.config(), &ProgressContext::hidden()).unwrap();

    assert_eq!(summary.added, 1);
    assert_eq!(summary.duplicates, 2);
    assert_eq!(extractor.call_count(), 1);
    let records = ws.output_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["TMK"], "1-2-3-456-789");
}

#[test]
fn non_qualifying_transfers_are_skipped() {
    let ws = Workspace::new();
    ws.write_input(&[parcel(
        "1234567890001",
        vec![
            transfer("2023-12-31T23:59:59-10:00", 900_000, "https://boc.example/a.pdf"),
            transfer("2024-02-01T00:00:00-10:00", 150_000, "https://boc.example/b.pdf"),
            transfer("2024-02-01T00:00:00-10:00", 250_000, "https://boc.example/missing.pdf"),
        ],
    )]);
    let extractor = RecordingExtractor::default();

    let summary = run_with(&extractor, &ws.config(), &ProgressContext::hidden()).unwrap();

    assert_eq!(summary.filtered, 2);
    assert_eq!(summary.added, 1);
    let records = ws.output_records();
    assert_eq!(records[0]["ConveyanceTax"], "Not found");
}

#[test]
fn parcel_without_transfers_contributes_nothing() {
    let ws = Workspace::new();
    ws.write_input(&[
        json!({"ParcelNumber": "1234567890001"}),
        json!({"ParcelNumber": "1234567890002", "Transfers": null}),
        json!({"ParcelNumber": "1234567890003", "Transfers": []}),
    ]);

    let summary =
        run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();

    assert_eq!(summary.parcels, 3);
    assert_eq!(summary.added, 0);
    assert_eq!(ws.output_text(), "[\n\n]\n");
    assert!(ws.output_records().is_empty());
}

#[test]
fn corrupt_output_is_moved_aside_not_lost() {
    let ws = Workspace::new();
    ws.write_input(&parcels(1));
    fs::write(&ws.output, "this is not json").unwrap();

    let summary =
        run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.existing, 0);
    assert_eq!(summary.added, 1);
    assert_eq!(ws.output_records().len(), 1);

    let dir = ws.output.parent().unwrap();
    let preserved: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().contains(".corrupt-"))
        .collect();
    assert_eq!(preserved.len(), 1);
    assert_eq!(fs::read_to_string(&preserved[0]).unwrap(), "this is not json");
}

#[test]
fn interrupted_output_is_resumed() {
    let ws = Workspace::new();
    ws.write_input(&parcels(2));
    run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();

    // Simulate a crash before the closing bracket
    let text = ws.output_text();
    fs::write(&ws.output, text.strip_suffix("\n]\n").unwrap()).unwrap();

    ws.write_input(&parcels(3));
    let extractor = RecordingExtractor::default();
    let summary = run_with(&extractor, &ws.config(), &ProgressContext::hidden()).unwrap();

    assert_eq!(summary.existing, 2);
    assert_eq!(summary.added, 1);
    assert_eq!(extractor.call_count(), 1);
    assert_eq!(ws.output_records().len(), 3);
}

#[test]
fn fatal_input_error_still_closes_output() {
    let ws = Workspace::new();
    let mut entries = parcels(2);
    entries.push(json!("not a parcel"));
    entries.extend(parcels(4).into_iter().skip(3));
    ws.write_input(&entries);

    let err = run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden())
        .unwrap_err();
    assert!(format!("{err:#}").contains("not a parcel object"));

    // Everything before the bad entry is kept, and the file is valid JSON
    let records = ws.output_records();
    assert_eq!(records.len(), 2);
}

#[test]
fn missing_input_leaves_prior_output_intact() {
    let ws = Workspace::new();
    ws.write_input(&parcels(2));
    run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();
    let before = ws.output_text();

    fs::remove_file(&ws.input).unwrap();
    let err = run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden())
        .unwrap_err();
    assert!(format!("{err:#}").contains("Cannot read"));
    assert_eq!(ws.output_text(), before);
}

#[test]
fn annotated_fetch_output_is_accepted_as_input() {
    let ws = Workspace::new();
    let body = serde_json::to_string_pretty(&parcels(1)[0]).unwrap();
    let text = format!(
        "[\n{body}\n// ERROR: Error making request at offset 1000: HTTP 500: Internal Server Error\n\n]\n"
    );
    assert!(parse_array_text(&text).is_ok());
    fs::write(&ws.input, text).unwrap();

    let summary =
        run_with(&RecordingExtractor::default(), &ws.config(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.added, 1);
}

#[test]
fn closures_work_as_extractors() {
    let ws = Workspace::new();
    ws.write_input(&parcels(1));
    let failing = |_: &str| TaxOutcome::Failed("HTTP 404: Not Found".to_string());

    run_with(&failing, &ws.config(), &ProgressContext::hidden()).unwrap();
    assert_eq!(
        ws.output_records()[0]["ConveyanceTax"],
        "Error accessing PDF: HTTP 404: Not Found"
    );
}
