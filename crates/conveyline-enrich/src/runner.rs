//! Enrichment orchestration: resume the output, append new transfers only

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use conveyline_core::{
    ParcelRecord, PersistedTransfer, ProgressContext, StreamingArrayWriter, fmt_num, read_array,
};
use indicatif::ProgressBar;
use serde_json::Value;

use crate::config::Config;
use crate::dedup::DedupIndex;
use crate::key::RecordKey;
use crate::ocr::OcrExtractor;
use crate::tax::{MISSING_LINK, TaxExtractor};
use crate::tmk::format_tmk;

/// Enrichment run summary
#[derive(Debug, Clone)]
pub struct Summary {
    pub output_path: PathBuf,
    /// Records already in the output before this run
    pub existing: usize,
    /// Parcels read from the input
    pub parcels: usize,
    /// Transfers appended by this run
    pub added: usize,
    /// Qualifying transfers skipped because the output already had them
    pub duplicates: usize,
    /// Transfers rejected by the selection predicate
    pub filtered: usize,
    pub elapsed: Duration,
}

impl Summary {
    /// Records in the output after this run
    pub fn total(&self) -> usize {
        self.existing + self.added
    }
}

/// Parcel bar plus a running count of appended transfers
struct Bars {
    parcels: ProgressBar,
    added: ProgressBar,
}

#[derive(Debug, Default)]
struct Counts {
    parcels: usize,
    added: usize,
    duplicates: usize,
    filtered: usize,
}

/// Run the enrichment pipeline with OCR-based tax extraction
pub fn run(config: &Config, progress: &ProgressContext) -> anyhow::Result<Summary> {
    let extractor = OcrExtractor::new(config.ocr.clone());
    run_with(&extractor, config, progress)
}

/// Run the enrichment pipeline with any [`TaxExtractor`].
///
/// Records are appended one at a time, so an interrupted run keeps
/// everything written so far and the next run resumes after it. The array
/// is closed on every exit path, including fatal errors.
pub fn run_with<E: TaxExtractor + ?Sized>(
    extractor: &E,
    config: &Config,
    progress: &ProgressContext,
) -> anyhow::Result<Summary> {
    let start = Instant::now();

    let (mut index, array_start) = DedupIndex::load(&config.output_path)?;
    let existing = index.loaded();

    let mut writer = StreamingArrayWriter::new(&config.output_path, array_start);
    writer.initialize()?;

    let mut counts = Counts::default();
    let result = process_input(extractor, config, progress, &mut index, &mut writer, &mut counts);

    if let Err(e) = &result {
        log::error!("Processing aborted: {e:#}");
    }
    let closed = writer.finalize();
    result?;
    closed?;

    let summary = Summary {
        output_path: config.output_path.clone(),
        existing,
        parcels: counts.parcels,
        added: counts.added,
        duplicates: counts.duplicates,
        filtered: counts.filtered,
        elapsed: start.elapsed(),
    };
    log::info!(
        "Added {} new transfers to {} ({} total, {} already present)",
        fmt_num(summary.added),
        summary.output_path.display(),
        fmt_num(summary.total()),
        fmt_num(summary.duplicates)
    );
    Ok(summary)
}

fn process_input<E: TaxExtractor + ?Sized>(
    extractor: &E,
    config: &Config,
    progress: &ProgressContext,
    index: &mut DedupIndex,
    writer: &mut StreamingArrayWriter,
    counts: &mut Counts,
) -> anyhow::Result<()> {
    let entries = read_array(&config.input_path)?;
    log::info!(
        "Read {} parcels from {}",
        fmt_num(entries.len()),
        config.input_path.display()
    );

    let bars = Bars {
        parcels: progress.count_bar("parcels", entries.len() as u64),
        added: progress.counter("new transfers"),
    };
    for (i, entry) in entries.into_iter().enumerate() {
        anyhow::ensure!(
            entry.is_object(),
            "Input entry {i} is not a parcel object: {entry}"
        );
        let parcel: ParcelRecord = serde_json::from_value(entry)
            .with_context(|| format!("Input entry {i} is not a parcel record"))?;
        counts.parcels += 1;

        process_parcel(extractor, config, &parcel, index, writer, counts, &bars)?;
        bars.parcels.inc(1);
    }
    bars.parcels.finish_and_clear();
    bars.added.finish_and_clear();
    Ok(())
}

fn process_parcel<E: TaxExtractor + ?Sized>(
    extractor: &E,
    config: &Config,
    parcel: &ParcelRecord,
    index: &mut DedupIndex,
    writer: &mut StreamingArrayWriter,
    counts: &mut Counts,
    bars: &Bars,
) -> anyhow::Result<()> {
    let tmk = match parcel.parcel_number_str() {
        Some(number) => Value::String(format_tmk(number)),
        None => parcel.parcel_number.clone(),
    };
    let label = tmk.as_str().map_or_else(|| tmk.to_string(), str::to_owned);

    for transfer in parcel.transfers() {
        let grantor = transfer.get("Grantor").unwrap_or(&Value::Null);
        if !config.predicate.qualifies(grantor) {
            counts.filtered += 1;
            continue;
        }

        let key = RecordKey::from_grantor(&parcel.parcel_number, grantor);
        if !index.insert(key) {
            counts.duplicates += 1;
            log::debug!("{label}: transfer already processed, skipping");
            continue;
        }

        let field = |name: &str| grantor.get(name).cloned().unwrap_or(Value::Null);
        let document_link = field("BureauOfConveyancesLink");
        let conveyance_tax = match document_link.as_str().filter(|url| !url.is_empty()) {
            Some(url) => {
                bars.parcels.set_message(label.clone());
                extractor.extract(url).into_stored()
            }
            None => MISSING_LINK.to_string(),
        };
        log::info!("{label}: conveyance tax {conveyance_tax}");

        writer.append(&PersistedTransfer {
            parcel_number: parcel.parcel_number.clone(),
            tmk: tmk.clone(),
            date: field("Date"),
            price: field("Price"),
            document_link,
            conveyance_tax: Value::String(conveyance_tax),
        })?;
        counts.added += 1;
        bars.added.inc(1);
    }
    Ok(())
}
