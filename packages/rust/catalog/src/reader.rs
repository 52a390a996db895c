//! Input table reader.

use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, Trim};
use encoding_rs::WINDOWS_1252;
use tracing::{debug, info, warn};

use grimoire_shared::{ColumnsConfig, GrimoireError, ProductInput, Result};

use crate::sheet::{TableFormat, read_first_sheet};

/// Name used when a row has no product name.
pub const UNNAMED_PRODUCT: &str = "UNNAMED_PRODUCT";

/// Header row and data rows of an input table, decoded to text.
struct RawTable {
    headers: Vec<String>,
    /// Data rows keyed by their zero-based position below the header.
    rows: Vec<(usize, Vec<String>)>,
}

/// Column positions resolved from the header row.
struct ColumnIndex {
    sku: Option<usize>,
    name: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &[String], columns: &ColumnsConfig) -> Self {
        let find = |wanted: &str| {
            let position = headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == wanted);
            if position.is_none() {
                warn!(column = wanted, "column missing from input, using defaults");
            }
            position
        };

        Self {
            sku: find(&columns.sku),
            name: find(&columns.name),
            quantity: find(&columns.quantity),
            price: find(&columns.price),
        }
    }
}

/// Read every product from a delimited text or spreadsheet input table.
///
/// Missing columns and empty or unparsable cells fall back to synthetic
/// defaults. Cells that are not valid UTF-8 are decoded as Windows-1252.
/// Rows the CSV reader cannot split are skipped with a warning, as are
/// blank spreadsheet rows. Unsupported file types and unreadable files are
/// errors.
pub fn read_products(path: &Path, columns: &ColumnsConfig) -> Result<Vec<ProductInput>> {
    let table = match TableFormat::from_path(path) {
        Some(TableFormat::Delimited) => read_delimited(path, columns.delimiter)?,
        Some(TableFormat::Spreadsheet) => read_spreadsheet(path)?,
        None => {
            return Err(GrimoireError::config(format!(
                "unsupported input format '{}'. Use a delimited text file (.csv, .tsv, .txt) \
                 or a spreadsheet (.xlsx, .xls).",
                path.display()
            )));
        }
    };

    let index = ColumnIndex::resolve(&table.headers, columns);
    let products: Vec<ProductInput> = table
        .rows
        .iter()
        .map(|(row, cells)| product_from_cells(cells, &index, *row))
        .collect();

    info!(path = %path.display(), count = products.len(), "input table loaded");
    Ok(products)
}

fn read_delimited(path: &Path, delimiter: char) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| read_error(path, e))?;

    let headers = decode_record(reader.byte_headers().map_err(|e| read_error(path, e))?);

    let mut rows = Vec::new();
    for (row, record) in reader.byte_records().enumerate() {
        match record {
            Ok(record) => rows.push((row, decode_record(&record))),
            Err(e) => warn!(row, error = %e, "skipping malformed row"),
        }
    }

    Ok(RawTable { headers, rows })
}

fn read_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut sheet = read_first_sheet(path)?.into_iter();
    let headers = sheet.next().unwrap_or_default();
    let rows = sheet
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(RawTable { headers, rows })
}

fn decode_record(record: &ByteRecord) -> Vec<String> {
    record.iter().map(decode_cell).collect()
}

/// Decode one cell, reading anything that is not UTF-8 as Windows-1252.
fn decode_cell(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            debug!(cell = %text, "cell is not UTF-8, decoded as Windows-1252");
            text.into_owned()
        }
    }
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| GrimoireError::config(format!("delimiter {delimiter:?} must be ASCII")))
}

fn read_error(path: &Path, e: csv::Error) -> GrimoireError {
    match e.into_kind() {
        csv::ErrorKind::Io(source) => GrimoireError::io(path, source),
        other => GrimoireError::parse(format!("{}: {other:?}", path.display())),
    }
}

fn product_from_cells(cells: &[String], index: &ColumnIndex, row: usize) -> ProductInput {
    let cell = |position: Option<usize>| {
        position
            .and_then(|p| cells.get(p))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let sku = cell(index.sku)
        .map(str::to_string)
        .unwrap_or_else(|| format!("SKU_GEN_{row}"));
    let name = cell(index.name)
        .map(str::to_string)
        .unwrap_or_else(|| UNNAMED_PRODUCT.to_string());
    let quantity = cell(index.quantity).and_then(parse_quantity).unwrap_or(0);
    let price = cell(index.price).and_then(parse_decimal).unwrap_or(0.0);

    debug!(row, %sku, "row parsed");
    ProductInput {
        sku,
        name,
        quantity,
        price,
    }
}

/// Parse a number written with either a decimal point or a decimal comma.
///
/// When both separators appear, the last one is the decimal separator and
/// the other groups thousands (`1.234,56` and `1,234.56` are both 1234.56).
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let normalized = match (raw.rfind(','), raw.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(_), None) => raw.replace(',', "."),
        _ => raw.to_string(),
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_quantity(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| parse_decimal(raw).map(|v| v.trunc() as i64))
}
