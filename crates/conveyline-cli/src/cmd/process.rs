//! Process subcommand - enrich new transfers with their conveyance tax

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use conveyline_core::{SharedProgress, fmt_num};

use super::{print_summary, timestamped_path};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Parcel records from `conveyline fetch`
    #[arg(short, long)]
    pub input_file: PathBuf,

    /// Output JSON file, resumed when it exists (default: processed_transfers_TIMESTAMP.json)
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,
}

pub fn run(args: ProcessArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let output = args
        .output_file
        .unwrap_or_else(|| timestamped_path("processed_transfers", "json"));
    let enrich_config = config.enrich_config(args.input_file, output);

    let summary = conveyline_enrich::run(&enrich_config, progress)?;

    print_summary(
        "Process",
        &[
            ("Existing records", fmt_num(summary.existing)),
            ("Parcels read", fmt_num(summary.parcels)),
            ("New transfers", fmt_num(summary.added)),
            ("Already processed", fmt_num(summary.duplicates)),
            ("Filtered out", fmt_num(summary.filtered)),
            ("Total in file", fmt_num(summary.total())),
            ("Output", summary.output_path.display().to_string()),
            ("Elapsed", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );
    Ok(())
}
