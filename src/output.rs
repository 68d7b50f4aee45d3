// Output artifacts: the flattened table, the skip logs, the quality
// report, and the console preview.
use crate::error::{ExtractError, ExtractResult};
use crate::skiplog::SkipLog;
use crate::table::FlatTable;
use crate::types::PreviewRow;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table};

/// Declared column order of the output table. Serialization follows the
/// `OutputRow` field order; this list exists to write a header for an
/// empty table and to pin the contract in tests.
pub const OUTPUT_COLUMNS: [&str; 13] = [
    "customer_id",
    "customer_name",
    "registration_date",
    "is_vip",
    "order_id",
    "order_date",
    "product_id",
    "product_name",
    "category",
    "unit_price",
    "item_quantity",
    "total_item_price",
    "total_order_value_percentage",
];

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> ExtractResult<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|source| ExtractError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    for r in rows {
        wtr.serialize(r).map_err(|source| ExtractError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    }
    wtr.flush().map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write the flattened table, header row included even when no rows
/// survived.
pub fn write_table(path: &Path, table: &FlatTable) -> ExtractResult<()> {
    if table.is_empty() {
        let mut wtr = csv::Writer::from_path(path).map_err(|source| ExtractError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        wtr.write_record(OUTPUT_COLUMNS)
            .map_err(|source| ExtractError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        wtr.flush().map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(());
    }
    write_csv(path, table.rows())?;
    tracing::info!(path = %path.display(), rows = table.len(), "saved flattened table");
    Ok(())
}

/// Write the three skip logs; a level with no entries gets no file.
/// Returns the paths actually written.
pub fn write_skip_logs(prefix: &str, skips: &SkipLog) -> ExtractResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    if !skips.customers().is_empty() {
        let path = PathBuf::from(format!("{prefix}_customers.csv"));
        write_csv(&path, skips.customers())?;
        written.push(path);
    }
    if !skips.orders().is_empty() {
        let path = PathBuf::from(format!("{prefix}_orders.csv"));
        write_csv(&path, skips.orders())?;
        written.push(path);
    }
    if !skips.items().is_empty() {
        let path = PathBuf::from(format!("{prefix}_items.csv"));
        write_csv(&path, skips.items())?;
        written.push(path);
    }
    Ok(written)
}

pub fn write_text(path: &Path, text: &str) -> ExtractResult<()> {
    fs::write(path, text).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Print the first `max_rows` rows of the table as a markdown table.
pub fn preview(table: &FlatTable, max_rows: usize) {
    let slice: Vec<PreviewRow> = table.rows().iter().take(max_rows).map(PreviewRow::from).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let rendered = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", rendered);
}
