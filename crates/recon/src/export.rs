//! Tabular views of run results, ready for a workbook writer.

use crate::invoice::InvoiceFileStats;
use crate::model::{Cell, DifferenceReport, Field, LineItem, NewItem, RecordSet, Sheet};

pub const REPORT_COLUMN_WIDTH: f64 = 24.0;
const DEFAULT_COLUMN_WIDTH: f64 = 12.0;
const NAME_COLUMN_WIDTH: f64 = 40.0;

pub const LINE_ITEM_HEADERS: [&str; 11] = [
    "Item#", "ID", "P/N", "Desc", "Qty", "Price", "Item_Name", "HSN", "BCD", "SWS", "IGST",
];

pub const NEW_ITEM_HEADERS: [&str; 6] = [
    "First Seen ID", "Item Name", "Final BCD", "Final SWS", "Final IGST", "HSN1",
];

pub const SUMMARY_HEADERS: [&str; 5] = [
    "Invoice File", "Sheets Processed", "Sheets Skipped", "Items Processed", "New Items Found",
];

/// One output sheet. An empty `headers` means rows are written verbatim
/// from the first line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Per-column widths; columns past the end use the writer default.
    pub column_widths: Vec<f64>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            column_widths: Vec::new(),
        }
    }

    fn with_uniform_width(mut self, width: f64) -> Self {
        self.column_widths = vec![width; self.headers.len()];
        self
    }
}

fn opt_text(s: Option<&str>) -> Cell {
    s.map(|s| Cell::text(s)).unwrap_or_default()
}

fn line_item_row(item: &LineItem) -> Vec<Cell> {
    vec![
        item.item_number.clone(),
        opt_text(item.composite_id.as_deref()),
        item.part_number.clone(),
        item.value(Field::Description).into_cell(),
        item.quantity.clone(),
        item.unit_price.clone(),
        opt_text(item.item_name.as_deref()),
        item.value(Field::Hsn).into_cell(),
        item.value(Field::Bcd).into_cell(),
        item.value(Field::Sws).into_cell(),
        item.value(Field::Igst).into_cell(),
    ]
}

/// Normalized line items, placeholders included, in source order.
pub fn line_items_table(name: &str, set: &RecordSet) -> Table {
    let mut table = Table::new(name, &LINE_ITEM_HEADERS).with_uniform_width(DEFAULT_COLUMN_WIDTH);
    table.rows = set.items.iter().map(line_item_row).collect();
    table
}

/// `ID` followed by every column that carries at least one change.
pub fn report_table(report: &DifferenceReport) -> Table {
    let mut headers = vec!["ID"];
    headers.extend(report.columns.iter().map(Field::label));
    let mut table = Table::new("Differences", &headers).with_uniform_width(REPORT_COLUMN_WIDTH);
    table.rows = report
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![Cell::text(row.id.clone())];
            cells.extend(report.columns.iter().map(|f| {
                opt_text(row.get(*f).map(|c| c.to_string()).as_deref())
            }));
            cells
        })
        .collect();
    table
}

/// Item names no rate-table tier could resolve, in first-seen order. The rate
/// and HSN columns are left blank for the user to fill in before the names
/// are added to the rate table.
pub fn new_items_table(items: &[NewItem]) -> Table {
    let mut out =
        Table::new("NewItems", &NEW_ITEM_HEADERS).with_uniform_width(DEFAULT_COLUMN_WIDTH);
    if let Some(w) = out.column_widths.get_mut(1) {
        *w = NAME_COLUMN_WIDTH;
    }
    out.rows = items
        .iter()
        .map(|item| {
            let mut row = vec![
                opt_text(item.first_seen_id.as_deref()),
                Cell::text(item.item_name.clone()),
            ];
            row.resize(NEW_ITEM_HEADERS.len(), Cell::Empty);
            row
        })
        .collect();
    out
}

/// Per-file counts with a closing `TOTAL` row.
pub fn summary_table(files: &[InvoiceFileStats]) -> Table {
    let mut table =
        Table::new("Summary", &SUMMARY_HEADERS).with_uniform_width(DEFAULT_COLUMN_WIDTH);
    if let Some(w) = table.column_widths.first_mut() {
        *w = NAME_COLUMN_WIDTH;
    }
    let count = |n: usize| Cell::Number(n as f64);
    for f in files {
        table.rows.push(vec![
            Cell::text(f.file.clone()),
            count(f.sheets_processed),
            count(f.sheets_skipped),
            count(f.items),
            count(f.new_items),
        ]);
    }
    let total = |get: fn(&InvoiceFileStats) -> usize| count(files.iter().map(get).sum());
    table.rows.push(vec![
        Cell::text("TOTAL"),
        total(|f| f.sheets_processed),
        total(|f| f.sheets_skipped),
        total(|f| f.items),
        total(|f| f.new_items),
    ]);
    table
}

/// Verbatim copy of a source sheet.
pub fn sheet_table(name: &str, sheet: &Sheet) -> Table {
    Table {
        name: name.to_string(),
        headers: Vec::new(),
        rows: sheet.rows.clone(),
        column_widths: Vec::new(),
    }
}
