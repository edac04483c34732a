use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single cell value as found in a worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Cell {
    /// Plain string cell.
    Text(String),
    /// Numeric cell. Integer cells are widened to `f64` on read.
    Number(f64),
    /// Boolean cell.
    Bool(bool),
    /// Date or date-time cell.
    DateTime(NaiveDateTime),
    /// Blank cell.
    Empty,
}

impl Cell {
    /// Returns `true` for blank cells.
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

// Spreadsheet numbers are finite, so bit-pattern hashing agrees with the
// derived value equality.
impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Cell::Text(value) => {
                0u8.hash(state);
                value.hash(state);
            }
            Cell::Number(value) => {
                1u8.hash(state);
                value.to_bits().hash(state);
            }
            Cell::Bool(value) => {
                2u8.hash(state);
                value.hash(state);
            }
            Cell::DateTime(value) => {
                3u8.hash(state);
                value.hash(state);
            }
            Cell::Empty => 4u8.hash(state),
        }
    }
}

/// An in-memory worksheet: named columns plus ordered data rows.
///
/// The column set is fixed when the table is created; every row holds one
/// cell per column. Row order mirrors the source file and is only changed by
/// explicit deduplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names taken from the header row.
    pub columns: Vec<String>,
    /// Data rows, one `Cell` per column.
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of data rows, excluding the header.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the table holds no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends every row of `other`, aligning columns by name.
    ///
    /// Columns missing from `other` are filled with empty cells. Columns new
    /// to `self` are added on the right and back-filled with empty cells for
    /// the rows already present.
    pub fn append_rows(&mut self, other: &Table) {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = other.columns.clone();
        }

        for column in &other.columns {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(Cell::Empty);
                }
            }
        }

        let targets: Vec<usize> = other
            .columns
            .iter()
            .map(|column| {
                self.columns
                    .iter()
                    .position(|name| name == column)
                    .unwrap_or_default()
            })
            .collect();

        for row in &other.rows {
            let mut cells = vec![Cell::Empty; self.columns.len()];
            for (source, &target) in targets.iter().enumerate() {
                if let Some(cell) = row.get(source) {
                    cells[target] = cell.clone();
                }
            }
            self.rows.push(cells);
        }
    }
}
