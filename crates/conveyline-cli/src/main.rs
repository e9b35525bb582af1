//! conveyline - real-estate transfer ingestion for Hawaii tax map keys
//!
//! Fetches parcel records from the search API, enriches qualifying deed
//! transfers with their conveyance tax, and exports the result to CSV.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "conveyline")]
#[command(about = "Real-estate transfer ingestion and conveyance tax enrichment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./conveyline.toml or ~/.config/conveyline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch parcel records from the search API
    Fetch(cmd::fetch::FetchArgs),
    /// Add conveyance tax to new qualifying transfers (resumable)
    Process(cmd::process::ProcessArgs),
    /// Convert enriched transfers to CSV
    Convert(cmd::convert::ConvertArgs),
    /// Show current configuration
    Config,
}

/// Warn-level default: asked for, or implied by progress bars on a TTY
fn quiet_logging(is_tty: bool, quiet: bool, debug: bool) -> bool {
    quiet || (is_tty && !debug)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(conveyline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  - progress bars show activity
    //   non-TTY: info unless --quiet/--debug  - logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = quiet_logging(is_tty, cli.quiet, cli.debug);
    conveyline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };
    conveyline_core::set_http_config(config.http_config());

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, &progress),
        Command::Process(args) => cmd::process::run(args, &config, &progress),
        Command::Convert(args) => cmd::convert::run(args),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["API base URL", &config.api.base_url]);
            table.add_row(vec!["API endpoint", &config.api.endpoint]);
            table.add_row(vec![
                "API token",
                if config.api.token.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec!["Batch size", &config.api.batch_size.to_string()]);
            for query in config.queries() {
                table.add_row(vec![
                    format!("Query {}", query.label),
                    format!("results {}..{}", query.start, query.end),
                ]);
            }
            table.add_row(vec![
                "Selection".to_string(),
                format!(
                    "{} in {}, price >= {}",
                    config.filter.instrument, config.filter.year, config.filter.min_price
                ),
            ]);
            table.add_row(vec!["Timeout", &format!("{}s", config.http.timeout)]);
            table.add_row(vec![
                "Connect timeout",
                &format!("{}s", config.http.connect_timeout),
            ]);
            table.add_row(vec!["Error annotations", &config.fetch.error_annotations]);
            table.add_row(vec!["pdftoppm", &config.ocr.pdftoppm.display().to_string()]);
            table.add_row(vec!["tesseract", &config.ocr.tesseract.display().to_string()]);
            table.add_row(vec!["OCR DPI", &config.ocr.dpi.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
