//! Table file formats and spreadsheet access.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use grimoire_shared::{GrimoireError, Result};

/// On-disk table layout, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text (`.csv`, `.tsv`, `.txt`).
    Delimited,
    /// Spreadsheet workbook (`.xlsx`, `.xls`). Only the first sheet is used.
    Spreadsheet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Delimited),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Every row of the first worksheet with cells rendered as text.
pub(crate) fn read_first_sheet(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| sheet_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| GrimoireError::parse(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| sheet_error(path, e))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

fn sheet_error(path: &Path, e: calamine::Error) -> GrimoireError {
    match e {
        calamine::Error::Io(source) => GrimoireError::io(path, source),
        other => GrimoireError::parse(format!("{}: {other}", path.display())),
    }
}
