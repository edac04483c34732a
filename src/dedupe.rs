use std::collections::HashSet;

use crate::model::{Cell, Table};

/// Removes exact duplicate rows from `table`, keeping the first occurrence of
/// each distinct row in its original position.
///
/// Two rows are duplicates only when every column holds an equal value; there
/// is no key-column notion. The input table is left untouched, and an empty
/// table yields an empty table.
pub fn dedupe(table: &Table) -> Table {
    let mut seen: HashSet<&[Cell]> = HashSet::with_capacity(table.rows.len());
    let mut rows = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        if seen.insert(row.as_slice()) {
            rows.push(row.clone());
        }
    }

    Table {
        columns: table.columns.clone(),
        rows,
    }
}
