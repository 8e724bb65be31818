//! Optional rendering of query results as tables.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::Value;

use crate::reply::NamedRows;

/// Turns headers and rows into a table.
pub trait TableFormat: Send + Sync {
    fn tabulate(&self, rows: &NamedRows) -> Table;
}

/// Bordered UTF-8 tables, strings shown without quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyTable;

impl TableFormat for PrettyTable {
    fn tabulate(&self, rows: &NamedRows) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(&rows.headers);
        for row in &rows.rows {
            table.add_row(row.iter().map(cell));
        }
        table
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
