//! Conveyline Enrich - conveyance tax enrichment of fetched transfers
//!
//! Reads parcel records produced by the fetch step, skips transfers already
//! present in the output, looks up the conveyance tax for each new one and
//! appends it to an array file that grows across runs.

pub mod config;
pub mod dedup;
pub mod key;
pub mod ocr;
pub mod runner;
pub mod tax;
pub mod tmk;

// Re-exports
pub use config::Config;
pub use dedup::DedupIndex;
pub use key::RecordKey;
pub use ocr::{OcrConfig, OcrExtractor};
pub use runner::{Summary, run, run_with};
pub use tax::{TaxExtractor, TaxOutcome, find_tax_amount};
pub use tmk::format_tmk;
