use std::collections::HashSet;
use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::Result;
use crate::model::{Cell, Table};

/// Writes `table` to `path` as a single-sheet workbook, creating or
/// overwriting the file.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_sheet(worksheet, table)?;
    workbook.save(path)?;
    Ok(())
}

/// A multi-sheet workbook assembled one sheet at a time and saved once.
///
/// Sheet names are sanitised to Excel's rules and uniqued with a numeric
/// suffix, so two source files with the same base name both end up in the
/// document.
pub struct WorkbookBuilder {
    workbook: Workbook,
    names: SheetNameRegistry,
    sheet_count: usize,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            names: SheetNameRegistry::default(),
            sheet_count: 0,
        }
    }

    /// Appends `table` as a new sheet and returns the name the sheet was
    /// actually given.
    pub fn add_sheet(&mut self, name: &str, table: &Table) -> Result<String> {
        let sheet_name = self.names.assign(name);
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;
        write_sheet(worksheet, table)?;
        self.sheet_count += 1;
        Ok(sheet_name)
    }

    /// Number of sheets appended so far.
    pub fn sheet_count(&self) -> usize {
        self.sheet_count
    }

    /// Saves the document to `path`. A document that never received a sheet
    /// still saves, with a single blank sheet, so the output file exists.
    pub fn save(mut self, path: &Path) -> Result<()> {
        if self.sheet_count == 0 {
            self.workbook.add_worksheet();
        }
        self.workbook.save(path)?;
        Ok(())
    }
}

impl Default for WorkbookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_sheet(worksheet: &mut Worksheet, table: &Table) -> Result<()> {
    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    match cell {
        Cell::Text(value) => {
            worksheet.write_string(row, col, value)?;
        }
        Cell::Number(value) => {
            worksheet.write_number(row, col, *value)?;
        }
        Cell::Bool(value) => {
            worksheet.write_boolean(row, col, *value)?;
        }
        Cell::DateTime(value) => {
            worksheet.write_datetime(row, col, value)?;
        }
        Cell::Empty => {}
    }
    Ok(())
}

#[derive(Debug, Default)]
struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let max_len = 31 - suffix.len();
            let mut prefix = base.clone();
            if prefix.len() > max_len {
                prefix.truncate(max_len);
            }
            let candidate = format!("{prefix}{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let mut sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    sanitized = sanitized.trim().to_string();
    if sanitized.is_empty() {
        sanitized = "Sheet".to_string();
    }

    if sanitized.len() > 31 {
        sanitized.truncate(31);
    }

    sanitized
}
