//! Catalog input and export tables.
//!
//! [`read_products`] loads a delimited or spreadsheet input table into
//! [`ProductInput`](grimoire_shared::ProductInput) rows;
//! [`write_results`] writes the enriched records as a CSV or `.xlsx` export.

pub mod reader;
pub mod sheet;
pub mod writer;

pub use reader::{UNNAMED_PRODUCT, parse_decimal, read_products};
pub use sheet::TableFormat;
pub use writer::{EXPORT_COLUMNS, ExportRow, read_export, write_results};
