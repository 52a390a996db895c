//! Export writer.

use std::path::Path;

use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use tracing::info;

use grimoire_shared::{EnrichmentResult, GrimoireError, Result};

use crate::sheet::{TableFormat, read_first_sheet};

/// Export column names, in order.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "name",
    "short_description",
    "long_description",
    "price",
    "sku",
    "weight",
    "stock",
    "image_url",
    "status",
    "local_image_path",
    "source_page_url",
];

/// One row of the export table. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    pub price: f64,
    pub sku: String,
    pub weight: u32,
    pub stock: i64,
    pub image_url: String,
    pub status: String,
    pub local_image_path: String,
    pub source_page_url: String,
}

/// A typed spreadsheet cell.
enum ExportCell<'a> {
    Text(&'a str),
    Number(f64),
}

impl ExportRow {
    fn cells(&self) -> [ExportCell<'_>; 11] {
        [
            ExportCell::Text(&self.name),
            ExportCell::Text(&self.short_description),
            ExportCell::Text(&self.long_description),
            ExportCell::Number(self.price),
            ExportCell::Text(&self.sku),
            ExportCell::Number(f64::from(self.weight)),
            ExportCell::Number(self.stock as f64),
            ExportCell::Text(&self.image_url),
            ExportCell::Text(&self.status),
            ExportCell::Text(&self.local_image_path),
            ExportCell::Text(&self.source_page_url),
        ]
    }

    fn from_cells(cells: &[String]) -> Option<Self> {
        let [
            name,
            short_description,
            long_description,
            price,
            sku,
            weight,
            stock,
            image_url,
            status,
            local_image_path,
            source_page_url,
        ] = cells
        else {
            return None;
        };

        Some(Self {
            name: name.clone(),
            short_description: short_description.clone(),
            long_description: long_description.clone(),
            price: price.parse().ok()?,
            sku: sku.clone(),
            weight: weight.parse().ok()?,
            stock: stock.parse().ok()?,
            image_url: image_url.clone(),
            status: status.clone(),
            local_image_path: local_image_path.clone(),
            source_page_url: source_page_url.clone(),
        })
    }
}

impl From<&EnrichmentResult> for ExportRow {
    fn from(result: &EnrichmentResult) -> Self {
        Self {
            name: result.name().to_string(),
            short_description: result.short_description().to_string(),
            long_description: result.long_description().to_string(),
            price: result.price(),
            sku: result.sku().to_string(),
            weight: result.weight(),
            stock: result.stock(),
            image_url: result.image_url().to_string(),
            status: result.status().to_string(),
            local_image_path: result.local_image().display_value(),
            source_page_url: result.source_page_url().to_string(),
        }
    }
}

/// Format of the export at `path`: `.xlsx` writes a workbook, legacy `.xls`
/// is refused, anything else is CSV.
fn export_format(path: &Path) -> Result<TableFormat> {
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    match TableFormat::from_path(path) {
        Some(TableFormat::Spreadsheet) if is_xlsx => Ok(TableFormat::Spreadsheet),
        Some(TableFormat::Spreadsheet) => Err(GrimoireError::config(format!(
            "cannot write legacy spreadsheet '{}'. Use .xlsx or .csv.",
            path.display()
        ))),
        _ => Ok(TableFormat::Delimited),
    }
}

/// Write all results, in the given order, to `path`.
///
/// The file extension picks the format (`.xlsx` or CSV). Missing parent
/// directories are created.
pub fn write_results(path: &Path, results: &[EnrichmentResult]) -> Result<()> {
    let format = export_format(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| GrimoireError::io(parent, e))?;
    }

    match format {
        TableFormat::Spreadsheet => write_workbook(path, results)?,
        TableFormat::Delimited => write_csv(path, results)?,
    }

    info!(path = %path.display(), rows = results.len(), ?format, "export written");
    Ok(())
}

fn write_csv(path: &Path, results: &[EnrichmentResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| export_error(path, e))?;
    for result in results {
        writer
            .serialize(ExportRow::from(result))
            .map_err(|e| export_error(path, e))?;
    }
    writer.flush().map_err(|e| GrimoireError::io(path, e))
}

fn write_workbook(path: &Path, results: &[EnrichmentResult]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, column) in (0u16..).zip(EXPORT_COLUMNS) {
        sheet
            .write_string(0, col, column)
            .map_err(|e| workbook_error(path, e))?;
    }

    for (row, result) in (1u32..).zip(results) {
        let export = ExportRow::from(result);
        for (col, cell) in (0u16..).zip(export.cells()) {
            let written = match cell {
                ExportCell::Text(text) => sheet.write_string(row, col, text),
                ExportCell::Number(value) => sheet.write_number(row, col, value),
            };
            written.map_err(|e| workbook_error(path, e))?;
        }
    }

    workbook.save(path).map_err(|e| workbook_error(path, e))
}

/// Read a previously written export (CSV or `.xlsx`).
pub fn read_export(path: &Path) -> Result<Vec<ExportRow>> {
    match export_format(path)? {
        TableFormat::Spreadsheet => read_workbook_export(path),
        TableFormat::Delimited => read_csv_export(path),
    }
}

fn read_csv_export(path: &Path) -> Result<Vec<ExportRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| export_error(path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<ExportRow>, _>>()
        .map_err(|e| export_error(path, e))
}

fn read_workbook_export(path: &Path) -> Result<Vec<ExportRow>> {
    read_first_sheet(path)?
        .iter()
        .enumerate()
        .skip(1)
        .map(|(row, cells)| {
            ExportRow::from_cells(cells).ok_or_else(|| {
                GrimoireError::Export(format!("{}: row {row} is not an export row", path.display()))
            })
        })
        .collect()
}

fn export_error(path: &Path, e: csv::Error) -> GrimoireError {
    GrimoireError::Export(format!("{}: {e}", path.display()))
}

fn workbook_error(path: &Path, e: XlsxError) -> GrimoireError {
    GrimoireError::Export(format!("{}: {e}", path.display()))
}
