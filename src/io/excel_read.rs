use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::error::{CleanError, Result};
use crate::model::{Cell, Table};

/// Reads the first worksheet of the workbook at `path` into a [`Table`].
///
/// Column names are taken from the first row; every following row becomes a
/// data row, padded with empty cells to the header width. A workbook without
/// a header row produces an empty table.
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(CleanError::MissingInput(path.to_path_buf()));
    }

    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = workbook.sheet_names().first().cloned().ok_or_else(|| {
        CleanError::InvalidWorkbook(format!("no worksheets in '{}'", path.display()))
    })?;

    let range_result = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| CleanError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))?;
    let range = range_result.map_err(CleanError::from)?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_to_header).collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(columns);
    for row in rows {
        let mut cells: Vec<Cell> = row.iter().map(cell_to_value).collect();
        cells.resize(table.columns.len(), Cell::Empty);
        table.rows.push(cells);
    }

    Ok(table)
}

fn cell_to_header(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.clone(),
        DataType::Float(value) => value.to_string(),
        DataType::Int(value) => value.to_string(),
        DataType::Bool(value) => value.to_string(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &DataType) -> Cell {
    match cell {
        DataType::String(value) => Cell::Text(value.clone()),
        DataType::Float(value) => Cell::Number(*value),
        DataType::Int(value) => Cell::Number(*value as f64),
        DataType::Bool(value) => Cell::Bool(*value),
        DataType::DateTime(_) => cell
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Empty),
        DataType::Empty => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}
