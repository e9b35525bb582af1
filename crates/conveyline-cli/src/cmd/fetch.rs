//! Fetch subcommand - page through the search API into a fresh array file

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use conveyline_core::{SharedProgress, fmt_num};

use super::{print_summary, timestamped_path};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Output JSON file (default: housing_data_TIMESTAMP.json)
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,
}

pub fn run(args: FetchArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let output = args
        .output_file
        .unwrap_or_else(|| timestamped_path("housing_data", "json"));
    let fetch_config = config.fetch_config(output)?;

    let summary = conveyline_fetch::run(&fetch_config, progress)?;

    let mut rows: Vec<(&str, String)> = summary
        .queries
        .iter()
        .map(|q| {
            (
                q.label.as_str(),
                format!(
                    "{} parcels, {}/{} batches ok",
                    fmt_num(q.stats.parcels),
                    q.stats.ok_batches,
                    q.stats.batches
                ),
            )
        })
        .collect();
    rows.push(("Parcels written", fmt_num(summary.parcels_written())));
    rows.push(("Failed batches", summary.failed_batches().to_string()));
    rows.push(("Output", summary.output_path.display().to_string()));
    rows.push(("Elapsed", format!("{:.1}s", summary.elapsed.as_secs_f64())));
    print_summary("Fetch", &rows);
    Ok(())
}
