use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::Serialize;

/// Score of one record that resolved to a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredUnit<'a> {
    pub cell_id: &'a str,
    pub score: i64,
}

/// Record count and summed score for one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CellTotals {
    pub count: u64,
    pub score_sum: i64,
}

impl CellTotals {
    fn add(&mut self, other: CellTotals) {
        self.count += other.count;
        self.score_sum += other.score_sum;
    }
}

/// Per-worker totals. Only cells that saw at least one record are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResult {
    cells: BTreeMap<String, CellTotals>,
}

impl PartialResult {
    pub fn record(&mut self, unit: ScoredUnit<'_>) {
        let totals = CellTotals {
            count: 1,
            score_sum: unit.score,
        };
        if let Some(existing) = self.cells.get_mut(unit.cell_id) {
            existing.add(totals);
        } else {
            self.cells.insert(unit.cell_id.to_owned(), totals);
        }
    }

    pub fn get(&self, cell_id: &str) -> Option<&CellTotals> {
        self.cells.get(cell_id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn records(&self) -> u64 {
        self.cells.values().map(|t| t.count).sum()
    }
}

impl<'a> FromIterator<ScoredUnit<'a>> for PartialResult {
    fn from_iter<I: IntoIterator<Item = ScoredUnit<'a>>>(iter: I) -> Self {
        iter.into_iter().fold(PartialResult::default(), |mut acc, unit| {
            acc.record(unit);
            acc
        })
    }
}

/// Globally merged totals, iterated in ascending cell id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalResult {
    cells: BTreeMap<String, CellTotals>,
}

impl FinalResult {
    /// Folds one partial result in. Summation makes the order of absorption irrelevant.
    pub fn absorb(&mut self, partial: PartialResult) {
        for (cell_id, totals) in partial.cells {
            self.cells.entry(cell_id).or_default().add(totals);
        }
    }

    pub fn get(&self, cell_id: &str) -> Option<&CellTotals> {
        self.cells.get(cell_id)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, CellTotals> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<'a> IntoIterator for &'a FinalResult {
    type Item = (&'a String, &'a CellTotals);
    type IntoIter = btree_map::Iter<'a, String, CellTotals>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sums counts and scores per cell across all partial results.
pub fn merge<I>(partials: I) -> FinalResult
where
    I: IntoIterator<Item = PartialResult>,
{
    partials
        .into_iter()
        .fold(FinalResult::default(), |mut merged, partial| {
            merged.absorb(partial);
            merged
        })
}
