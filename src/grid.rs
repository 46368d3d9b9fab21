use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Axis-aligned rectangle, open on the low edges and closed on the high edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Cell {
    /// `xmin < x <= xmax && ymin < y <= ymax`. NaN never matches.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.xmin && x <= self.xmax && y > self.ymin && y <= self.ymax
    }
}

#[derive(Deserialize)]
struct GridDocument {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: Cell,
}

/// Ordered list of cells. Resolution returns the first containing cell, so the
/// order of the source document decides overlaps.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    cells: Vec<Cell>,
}

impl SpatialIndex {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GridError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| GridError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_json(&raw)?;
        debug!("loaded grid {}: {} cells", path.display(), index.len());
        Ok(index)
    }

    /// Parses a `{"features": [{"properties": {id, xmin, xmax, ymin, ymax}}]}` document.
    pub fn from_json(raw: &str) -> Result<Self, GridError> {
        let doc: GridDocument = serde_json::from_str(raw)?;
        Self::from_cells(doc.features.into_iter().map(|f| f.properties).collect())
    }

    pub fn from_cells(cells: Vec<Cell>) -> Result<Self, GridError> {
        let mut ids = HashSet::with_capacity(cells.len());
        for cell in &cells {
            if !ids.insert(cell.id.as_str()) {
                return Err(GridError::DuplicateCell {
                    id: cell.id.clone(),
                });
            }
        }
        Ok(Self { cells })
    }

    /// Id of the first cell containing `(x, y)`, scanning in index order.
    pub fn resolve(&self, x: f64, y: f64) -> Option<&str> {
        self.cells
            .iter()
            .find(|cell| cell.contains(x, y))
            .map(|cell| cell.id.as_str())
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
