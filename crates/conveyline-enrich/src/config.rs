//! Enrichment pipeline configuration

use std::path::PathBuf;

use conveyline_core::SelectionPredicate;

use crate::ocr::OcrConfig;

/// Runtime configuration for the enrichment pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Parcel records from the fetch step
    pub input_path: PathBuf,
    /// Enriched transfers; resumed when it already exists
    pub output_path: PathBuf,
    pub ocr: OcrConfig,
    pub predicate: SelectionPredicate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("housing_data.json"),
            output_path: PathBuf::from("processed_transfers.json"),
            ocr: OcrConfig::default(),
            predicate: SelectionPredicate::default(),
        }
    }
}
