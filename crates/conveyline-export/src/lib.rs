//! Conveyline Export - flatten enriched transfers into a spreadsheet-ready CSV
//!
//! One row per persisted transfer with columns `ParcelNumber`, `Date`,
//! `Price`, `ConveyanceTax`. The tax column is either a plain decimal
//! number or `ERROR`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use conveyline_core::read_array;
use serde_json::Value;

/// CSV header row
pub const HEADER: [&str; 4] = ["ParcelNumber", "Date", "Price", "ConveyanceTax"];

/// Written in place of any tax value that is not a number
pub const ERROR: &str = "ERROR";

/// Conversion summary
#[derive(Debug, Clone)]
pub struct Summary {
    pub output_path: PathBuf,
    pub rows: usize,
    /// Rows whose tax column became `ERROR`
    pub tax_errors: usize,
    pub elapsed: Duration,
}

/// Normalize a stored `ConveyanceTax` value for the CSV.
///
/// Thousands separators are removed and the rest must parse as a finite
/// number. Sentinels, error descriptions and non-string values all become
/// `ERROR`.
pub fn normalize_tax(value: &Value) -> String {
    let Some(text) = value.as_str() else {
        return ERROR.to_string();
    };
    if text == ERROR || text == "Not found" {
        return ERROR.to_string();
    }
    let cleaned = text.replace(',', "");
    match cleaned.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => cleaned,
        _ => ERROR.to_string(),
    }
}

/// Cell text for a scalar field: strings unquoted, other values as JSON,
/// missing or null as an empty cell.
fn cell(record: &Value, name: &str) -> String {
    match record.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Flatten one persisted transfer into a CSV row
pub fn to_row(record: &Value) -> [String; 4] {
    [
        cell(record, "ParcelNumber"),
        cell(record, "Date"),
        cell(record, "Price"),
        normalize_tax(record.get("ConveyanceTax").unwrap_or(&Value::Null)),
    ]
}

/// Convert an enriched transfer file to CSV
pub fn run(input: &Path, output: &Path) -> anyhow::Result<Summary> {
    let start = Instant::now();
    let records = read_array(input)?;
    log::info!("Read {} records from {}", records.len(), input.display());

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Cannot create {}", output.display()))?;
    writer.write_record(HEADER)?;

    let mut tax_errors = 0;
    for record in &records {
        let row = to_row(record);
        if row[3] == ERROR {
            tax_errors += 1;
        }
        writer.write_record(&row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Cannot write {}", output.display()))?;

    let summary = Summary {
        output_path: output.to_path_buf(),
        rows: records.len(),
        tax_errors,
        elapsed: start.elapsed(),
    };
    log::info!(
        "Converted {} records to {} ({} without a usable tax amount)",
        summary.rows,
        summary.output_path.display(),
        summary.tax_errors
    );
    Ok(summary)
}
