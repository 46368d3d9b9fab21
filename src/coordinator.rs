//! Coordinator and worker roles.
//!
//! The coordinator resolves every record to a cell, splits the resolved records
//! into one contiguous shard per worker and moves each shard into its worker's
//! job. Workers run on a fixed-size rayon pool, fold their shard into a
//! [`PartialResult`] and send it back on a shared results channel. A worker
//! that panics drops its sender without reporting. The run only produces a
//! [`FinalResult`] when every worker has reported.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Sender, unbounded};
use log::{debug, error, info};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::aggregate::{FinalResult, PartialResult, ScoredUnit, merge};
use crate::error::PipelineError;
use crate::grid::SpatialIndex;
use crate::lexicon::Lexicon;
use crate::partition::partition;
use crate::records::Record;
use crate::scorer::score;

/// A record's text paired with the cell it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<'g> {
    pub cell_id: &'g str,
    pub text: String,
}

/// What a run produced, with the bookkeeping needed to sanity-check it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: FinalResult,
    /// Records handed to the coordinator.
    pub ingested: usize,
    /// Records that resolved to a cell.
    pub resolved: usize,
    /// Records that matched no cell.
    pub discarded: usize,
    /// Number of records dispatched to each worker, by worker index.
    pub shard_sizes: Vec<usize>,
}

/// Message a worker sends back at the collect barrier.
struct WorkerReport {
    worker: usize,
    partial: PartialResult,
}

/// Scores one shard against a shared, read-only lexicon.
#[derive(Debug, Clone, Copy)]
pub struct Worker<'l> {
    id: usize,
    lexicon: &'l Lexicon,
}

impl<'l> Worker<'l> {
    pub fn new(id: usize, lexicon: &'l Lexicon) -> Self {
        Self { id, lexicon }
    }

    /// Sequential fold of the shard into per-cell totals.
    pub fn process(&self, shard: &[Located<'_>]) -> PartialResult {
        let partial: PartialResult = shard
            .iter()
            .map(|item| ScoredUnit {
                cell_id: item.cell_id,
                score: score(self.lexicon, &item.text),
            })
            .collect();
        debug!(
            "worker {}: scored {} records into {} cells",
            self.id,
            shard.len(),
            partial.len()
        );
        partial
    }
}

fn serve<'g, F>(
    worker: usize,
    shard: Vec<Located<'g>>,
    results: Sender<WorkerReport>,
    process: &F,
) where
    F: Fn(usize, &[Located<'g>]) -> PartialResult + Sync,
{
    let partial = process(worker, &shard);
    // The receiver outlives the pool scope, so this send cannot be refused.
    let _ = results.send(WorkerReport { worker, partial });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

/// Drives one run across a fixed number of workers.
#[derive(Debug, Clone, Copy)]
pub struct Coordinator<'a> {
    lexicon: &'a Lexicon,
    grid: &'a SpatialIndex,
    workers: usize,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        lexicon: &'a Lexicon,
        grid: &'a SpatialIndex,
        workers: usize,
    ) -> Result<Self, PipelineError> {
        if workers == 0 {
            return Err(PipelineError::NoWorkers);
        }
        Ok(Self {
            lexicon,
            grid,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Pairs each record with its cell, keeping input order. Records outside
    /// every cell are dropped.
    pub fn locate(&self, records: Vec<Record>) -> Vec<Located<'a>> {
        let grid = self.grid;
        records
            .into_par_iter()
            .filter_map(|record| {
                let (x, y) = record.coordinates;
                grid.resolve(x, y).map(|cell_id| Located {
                    cell_id,
                    text: record.text,
                })
            })
            .collect()
    }

    /// Scores `records` across all workers and merges their partial results.
    pub fn run(&self, records: Vec<Record>) -> Result<RunOutcome, PipelineError> {
        let lexicon = self.lexicon;
        self.execute(records, move |worker, shard: &[Located<'a>]| {
            Worker::new(worker, lexicon).process(shard)
        })
    }

    fn execute<F>(&self, records: Vec<Record>, process: F) -> Result<RunOutcome, PipelineError>
    where
        F: Fn(usize, &[Located<'a>]) -> PartialResult + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("scorer-{i}"))
            .build()?;

        let total = records.len();
        let located = pool.install(|| self.locate(records));
        let resolved = located.len();
        let discarded = total - resolved;
        info!("resolved {resolved} of {total} records to cells ({discarded} discarded)");

        let shards = partition(located, self.workers);
        let shard_sizes: Vec<usize> = shards.iter().map(Vec::len).collect();
        debug!("shard sizes: {shard_sizes:?}");

        // Distribute: each job owns exactly its own shard.
        let (results_tx, results_rx) = unbounded();
        let process = &process;
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.scope(|scope| {
                for (worker, shard) in shards.into_iter().enumerate() {
                    let results = results_tx.clone();
                    scope.spawn(move |_| serve(worker, shard, results, process));
                }
            })
        }))
        .err()
        .map(panic_message);
        drop(results_tx);
        if let Some(msg) = &unwound {
            error!("worker pool unwound: {msg}");
        }

        // Collect: one report per worker, or the run fails as a whole.
        let mut partials: Vec<Option<PartialResult>> = vec![None; self.workers];
        for report in results_rx.iter() {
            partials[report.worker] = Some(report.partial);
        }
        let partials = partials
            .into_iter()
            .enumerate()
            .map(|(worker, partial)| {
                partial.ok_or_else(|| {
                    let reason = match &unwound {
                        Some(msg) => format!("exited without reporting ({msg})"),
                        None => "exited without reporting".to_string(),
                    };
                    error!("worker {worker} failed: {reason}");
                    PipelineError::WorkerFailure { worker, reason }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result = merge(partials);
        info!(
            "merged {} partial results into {} cells",
            self.workers,
            result.len()
        );
        Ok(RunOutcome {
            result,
            ingested: total,
            resolved,
            discarded,
            shard_sizes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::CellTotals;
    use crate::grid::Cell;

    fn grid() -> SpatialIndex {
        let cell = |id: &str, xmin: f64, xmax: f64| Cell {
            id: id.to_string(),
            xmin,
            xmax,
            ymin: 0.0,
            ymax: 10.0,
        };
        SpatialIndex::from_cells(vec![cell("A1", 0.0, 10.0), cell("B1", 10.0, 20.0)]).unwrap()
    }

    fn lexicon() -> Lexicon {
        Lexicon::from_entries([("not good", -2), ("good", 3), ("bad", -3)]).unwrap()
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new(5.0, 5.0, "good good"),
            Record::new(15.0, 5.0, "not good"),
            Record::new(50.0, 5.0, "good"),
            Record::new(5.0, 9.0, "bad!"),
            Record::new(12.0, 1.0, "nothing here"),
        ]
    }

    #[test]
    fn run_totals_and_discards() {
        let (lex, grid) = (lexicon(), grid());
        let outcome = Coordinator::new(&lex, &grid, 2).unwrap().run(records()).unwrap();
        assert_eq!(outcome.ingested, 5);
        assert_eq!(outcome.resolved, 4);
        assert_eq!(outcome.discarded, 1);
        assert_eq!(outcome.shard_sizes, vec![2, 2]);
        assert_eq!(outcome.result.len(), 2);
        assert_eq!(
            outcome.result.get("A1"),
            Some(&CellTotals { count: 2, score_sum: 3 })
        );
        assert_eq!(
            outcome.result.get("B1"),
            Some(&CellTotals { count: 2, score_sum: -2 })
        );
    }

    #[test]
    fn worker_count_does_not_change_the_result() {
        let (lex, grid) = (lexicon(), grid());
        let baseline = Coordinator::new(&lex, &grid, 1).unwrap().run(records()).unwrap();
        for workers in [2, 5, 17] {
            let outcome = Coordinator::new(&lex, &grid, workers)
                .unwrap()
                .run(records())
                .unwrap();
            assert_eq!(outcome.result, baseline.result, "workers = {workers}");
            assert_eq!(outcome.shard_sizes.len(), workers);
        }
    }

    #[test]
    fn empty_shards_are_harmless() {
        let (lex, grid) = (lexicon(), grid());
        let outcome = Coordinator::new(&lex, &grid, 5)
            .unwrap()
            .run(records().into_iter().take(3).collect())
            .unwrap();
        assert_eq!(outcome.shard_sizes, vec![1, 1, 0, 0, 0]);
        assert_eq!(outcome.result.get("A1").map(|t| t.count), Some(1));
        assert_eq!(outcome.result.get("B1").map(|t| t.count), Some(1));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let (lex, grid) = (lexicon(), grid());
        assert!(matches!(
            Coordinator::new(&lex, &grid, 0),
            Err(PipelineError::NoWorkers)
        ));
    }

    #[test]
    fn panicking_worker_is_missing_at_collect() {
        let (lex, grid) = (lexicon(), grid());
        let coordinator = Coordinator::new(&lex, &grid, 2).unwrap();
        let err = coordinator
            .execute(records(), |worker, _shard| -> PartialResult {
                panic!("worker {worker} gave up")
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::WorkerFailure { worker: 0, .. }));
    }

    #[test]
    fn failing_worker_fails_the_run() {
        let (lex, grid) = (lexicon(), grid());
        let coordinator = Coordinator::new(&lex, &grid, 3).unwrap();
        let err = coordinator
            .execute(records(), |worker, shard| {
                if worker == 1 {
                    panic!("shard {worker} is corrupt");
                }
                Worker::new(worker, &lex).process(shard)
            })
            .unwrap_err();
        match err {
            PipelineError::WorkerFailure { worker, reason } => {
                assert_eq!(worker, 1);
                assert!(reason.starts_with("exited without reporting"), "{reason}");
                assert!(reason.contains("shard 1 is corrupt"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
