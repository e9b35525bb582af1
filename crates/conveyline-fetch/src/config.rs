//! Fetch pipeline configuration

use std::path::PathBuf;

use conveyline_core::SelectionPredicate;

use crate::annotate::AnnotationMode;

/// One search query and the slice of its results to page through
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Short name for logs and summaries
    pub label: String,
    pub query: String,
    /// First result index (inclusive)
    pub start: usize,
    /// Last result index (exclusive)
    pub end: usize,
}

impl QuerySpec {
    pub fn total(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// The two half-year queries covering 2024 deed sales of 200k and up.
pub fn default_queries() -> Vec<QuerySpec> {
    let query = |from: &str, to: &str| {
        format!(
            "(TaxMapKey.Transfers.Grantor.Date: from {from} to {to}) \
             AND (TaxMapKey.LastSaleInstrument: \"DEED\") \
             AND (TaxMapKey.Transfers.Grantor.Price: from 200000)"
        )
    };
    vec![
        QuerySpec {
            label: "2024 H1".to_string(),
            query: query("2024-01-01T00:00:00-10:00", "2024-06-30T23:59:59-10:00"),
            start: 0,
            end: 7967,
        },
        QuerySpec {
            label: "2024 H2".to_string(),
            query: query("2024-07-01T00:00:00-10:00", "2024-12-31T23:59:59-10:00"),
            start: 0,
            end: 8512,
        },
    ]
}

/// Runtime configuration for the fetch pipeline
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub endpoint: String,
    /// Bearer token, with or without the `Bearer ` prefix
    pub token: Option<String>,
    pub batch_size: usize,
    pub queries: Vec<QuerySpec>,
    /// Output array file, truncated at the start of every run
    pub output_path: PathBuf,
    pub annotations: AnnotationMode,
    pub predicate: SelectionPredicate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://mls.hiinfo.com".to_string(),
            endpoint: "/api/search/tax-map-keys/".to_string(),
            token: None,
            batch_size: 1000,
            queries: default_queries(),
            output_path: PathBuf::from("housing_data.json"),
            annotations: AnnotationMode::default(),
            predicate: SelectionPredicate::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be at least 1");
        anyhow::ensure!(!self.queries.is_empty(), "No queries configured");
        for q in &self.queries {
            anyhow::ensure!(
                q.start <= q.end,
                "Query '{}': start {} is past end {}",
                q.label,
                q.start,
                q.end
            );
        }
        Ok(())
    }
}
