#![forbid(unsafe_code)]
//! # grid_sentiment CLI
//!
//! Command-line front-end for the `grid_sentiment` crate: scores a record
//! source against a lexicon, bins records into grid cells and prints one row
//! per cell with its record count and signed score total.
//!
//! ## Example
//! ```bash
//! cargo run --release -- --lexicon AFINN.txt --grid melbGrid.json \
//!     --records bigTwitter.json --workers 8 --export-format csv
//! ```
//!
//! Exit status: `1` when an input cannot be loaded, `3` when a worker fails,
//! `4` when the report cannot be written. No report is printed on failure.

use clap::Parser;
use grid_sentiment::{
    Error, ExportFormat, RecordFormat, RunOptions, default_workers, render, run, save_report,
};
use log::{error, info};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Tab-separated lexicon file (entry<TAB>weight per line)
    #[arg(long)]
    lexicon: PathBuf,

    /// Grid definition (JSON document with a `features` list)
    #[arg(long)]
    grid: PathBuf,

    /// Record source (JSON document with `rows`, or one row per line)
    #[arg(long)]
    records: PathBuf,

    /// Number of workers (default: available parallelism)
    #[arg(long, value_parser = parse_workers)]
    workers: Option<usize>,

    /// Layout of the record source
    #[arg(long, value_enum, default_value = "auto")]
    record_format: RecordFormat,

    /// Output format for the report (txt, csv, tsv, json)
    #[arg(long, value_enum, default_value = "txt")]
    export_format: ExportFormat,

    /// If set, also save the report as a timestamped file in this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn parse_workers(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("worker count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn execute(cli: Cli) -> Result<String, Error> {
    let options = RunOptions {
        lexicon: cli.lexicon,
        grid: cli.grid,
        records: cli.records,
        record_format: cli.record_format,
        workers: cli.workers.unwrap_or_else(default_workers),
    };
    info!("running with {} workers", options.workers);

    let report = run(&options)?;
    let rendered = render(&report.outcome.result, cli.export_format).map_err(Error::Report)?;
    if let Some(dir) = cli.output_dir {
        let path = save_report(&rendered, &dir, cli.export_format).map_err(Error::Report)?;
        info!("report saved to {}", path.display());
    }
    Ok(rendered)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match execute(cli) {
        Ok(rendered) => println!("{}", rendered.trim_end()),
        Err(e) => {
            error!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
