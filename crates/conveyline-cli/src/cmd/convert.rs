//! Convert subcommand - enriched transfers to CSV

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use conveyline_core::fmt_num;

use super::{print_summary, timestamped_path};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Enriched transfers from `conveyline process`
    #[arg(short, long)]
    pub input_file: PathBuf,

    /// Output CSV file (default: sales_data_TIMESTAMP.csv)
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let output = args
        .output_file
        .unwrap_or_else(|| timestamped_path("sales_data", "csv"));

    let summary = conveyline_export::run(&args.input_file, &output)?;

    print_summary(
        "Convert",
        &[
            ("Rows written", fmt_num(summary.rows)),
            ("Tax errors", fmt_num(summary.tax_errors)),
            ("Output", summary.output_path.display().to_string()),
        ],
    );
    Ok(())
}
