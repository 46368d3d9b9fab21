//! # grid_sentiment
//!
//! Scores geotagged short texts against a phrase-aware sentiment lexicon and
//! aggregates record counts and score totals per spatial cell, spreading the
//! scoring over a fixed number of workers.
//!
//! A run goes: load the lexicon and grid, ingest records, resolve each record
//! to the first cell containing it, split the resolved records into one
//! contiguous shard per worker, score each shard independently, and merge the
//! per-worker totals. The merged result does not depend on the worker count.
//!
//! ## Example
//! ```
//! use grid_sentiment::{Cell, Coordinator, Lexicon, Record, SpatialIndex};
//!
//! let lexicon = Lexicon::from_entries([("not good", -2), ("good", 3)]).unwrap();
//! let grid = SpatialIndex::from_cells(vec![Cell {
//!     id: "A1".into(), xmin: 0.0, xmax: 10.0, ymin: 0.0, ymax: 10.0,
//! }]).unwrap();
//! let records = vec![
//!     Record::new(1.0, 1.0, "Not good."),
//!     Record::new(2.0, 2.0, "good!"),
//!     Record::new(50.0, 50.0, "good"),
//! ];
//!
//! let outcome = Coordinator::new(&lexicon, &grid, 2).unwrap().run(records).unwrap();
//! let a1 = outcome.result.get("A1").unwrap();
//! assert_eq!((a1.count, a1.score_sum), (2, 1));
//! assert_eq!(outcome.discarded, 1);
//! ```

pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod grid;
pub mod lexicon;
pub mod partition;
pub mod records;
pub mod report;
pub mod scorer;

use std::path::PathBuf;

use log::info;

pub use aggregate::{CellTotals, FinalResult, PartialResult, ScoredUnit, merge};
pub use coordinator::{Coordinator, Located, RunOutcome, Worker};
pub use error::{Error, GridError, LexiconError, PipelineError, RecordSourceError};
pub use grid::{Cell, SpatialIndex};
pub use lexicon::{Lexicon, PhraseEntry};
pub use partition::{partition, shard_bounds};
pub use records::{Ingested, Record, RecordFormat, load_records, parse_document, parse_lines};
pub use report::{ExportFormat, csv_safe_cell, render, save_report, signed};
pub use scorer::score;

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub lexicon: PathBuf,
    pub grid: PathBuf,
    pub records: PathBuf,
    pub record_format: RecordFormat,
    pub workers: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Rows dropped during ingestion because they did not parse.
    pub skipped: usize,
}

/// Worker count used when none is given: the machine's available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Loads all inputs and runs the distributed scoring pipeline.
///
/// Lexicon and grid are loaded (and validated) before any record is read, so a
/// bad lexicon fails the run without touching the record source.
pub fn run(options: &RunOptions) -> Result<RunReport, Error> {
    let lexicon = Lexicon::load(&options.lexicon)?;
    let grid = SpatialIndex::load(&options.grid)?;
    info!(
        "lexicon: {} words, {} phrases; grid: {} cells",
        lexicon.word_count(),
        lexicon.phrase_count(),
        grid.len()
    );
    let coordinator = Coordinator::new(&lexicon, &grid, options.workers)?;

    let ingested = load_records(&options.records, options.record_format)?;
    let outcome = coordinator.run(ingested.records)?;
    Ok(RunReport {
        outcome,
        skipped: ingested.skipped,
    })
}
