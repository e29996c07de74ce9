use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::text::{format_number, parse_financial_number};

/// Rendering of an unresolved tariff field in tables and reports.
pub const UNMATCHED_LABEL: &str = "UNMATCHED";

// ---------------------------------------------------------------------------
// Input: cells, sheets, workbooks
// ---------------------------------------------------------------------------

/// A single spreadsheet value as delivered by the workbook reader.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Empty, whitespace-only text, or a non-finite number.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => !n.is_finite(),
            Cell::Bool(_) => false,
        }
    }

    /// Numeric reading of the cell. Text goes through the financial parser,
    /// so `"1,250.00"` and `1250` read the same.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => parse_financial_number(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) if n.is_finite() => f.write_str(&format_number(*n)),
            Cell::Number(_) => Ok(()),
            Cell::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

/// One worksheet, addressed positionally. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// Cell at `col`, or an empty cell past the end of a ragged row.
pub fn cell_at(row: &[Cell], col: usize) -> &Cell {
    row.get(col).unwrap_or(&EMPTY_CELL)
}

pub fn row_is_blank(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_blank)
}

/// A loaded workbook: its display name (usually the file stem) and sheets in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(name: impl Into<String>, sheets: Vec<Sheet>) -> Self {
        Self { name: name.into(), sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Comparable fields
// ---------------------------------------------------------------------------

/// Declared facts of a line item, in report column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Field {
    #[serde(rename = "P/N")]
    PartNumber,
    #[serde(rename = "Desc")]
    Description,
    #[serde(rename = "HSN")]
    Hsn,
    #[serde(rename = "BCD")]
    Bcd,
    #[serde(rename = "SWS")]
    Sws,
    #[serde(rename = "IGST")]
    Igst,
    #[serde(rename = "Qty")]
    Quantity,
    #[serde(rename = "Price")]
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Hsn,
    Price,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::PartNumber,
        Field::Description,
        Field::Hsn,
        Field::Bcd,
        Field::Sws,
        Field::Igst,
        Field::Quantity,
        Field::Price,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::PartNumber => "P/N",
            Field::Description => "Desc",
            Field::Hsn => "HSN",
            Field::Bcd => "BCD",
            Field::Sws => "SWS",
            Field::Igst => "IGST",
            Field::Quantity => "Qty",
            Field::Price => "Price",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::PartNumber | Field::Description => FieldKind::Text,
            Field::Hsn => FieldKind::Hsn,
            Field::Bcd | Field::Sws | Field::Igst | Field::Quantity => FieldKind::Numeric,
            Field::Price => FieldKind::Price,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The value a line item holds for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Cell(Cell),
    /// Tariff field of an item whose name resolved to no rate entry.
    Unmatched,
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Cell(c) => c.is_blank(),
            FieldValue::Unmatched => false,
        }
    }

    pub fn into_cell(self) -> Cell {
        match self {
            FieldValue::Cell(c) => c,
            FieldValue::Unmatched => Cell::text(UNMATCHED_LABEL),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Cell(c) => c.fmt(f),
            FieldValue::Unmatched => f.write_str(UNMATCHED_LABEL),
        }
    }
}

// ---------------------------------------------------------------------------
// Tariffs
// ---------------------------------------------------------------------------

/// Aggregated rate-table entry for one item name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffEntry {
    pub item_name: String,
    /// One or more HSN codes, space separated.
    pub hsn: String,
    pub bcd: Option<f64>,
    pub sws: Option<f64>,
    pub igst: Option<f64>,
}

/// Duty fields exactly as a checklist row declares them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredDuty {
    pub hsn: Cell,
    pub bcd: Cell,
    pub sws: Cell,
    pub igst: Cell,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tariff {
    /// Resolved from the rate table.
    Matched(TariffEntry),
    /// Read from the declaring document.
    Declared(DeclaredDuty),
    /// Item name present but no rate entry cleared the match threshold.
    Unmatched,
    /// No item name to resolve (placeholder rows, empty descriptions).
    Blank,
}

impl Tariff {
    fn value(&self, field: Field) -> FieldValue {
        let rate = |r: Option<f64>| FieldValue::Cell(r.map(Cell::Number).unwrap_or_default());
        match self {
            Tariff::Matched(entry) => match field {
                Field::Hsn if entry.hsn.trim().is_empty() => FieldValue::Cell(Cell::Empty),
                Field::Hsn => FieldValue::Cell(Cell::text(entry.hsn.clone())),
                Field::Bcd => rate(entry.bcd),
                Field::Sws => rate(entry.sws),
                Field::Igst => rate(entry.igst),
                _ => FieldValue::Cell(Cell::Empty),
            },
            Tariff::Declared(duty) => FieldValue::Cell(match field {
                Field::Hsn => duty.hsn.clone(),
                Field::Bcd => duty.bcd.clone(),
                Field::Sws => duty.sws.clone(),
                Field::Igst => duty.igst.clone(),
                _ => Cell::Empty,
            }),
            Tariff::Unmatched => FieldValue::Unmatched,
            Tariff::Blank => FieldValue::Cell(Cell::Empty),
        }
    }
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// Canonical line item produced by either normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub item_number: Cell,
    pub source_group_id: Option<String>,
    /// `<group>_<item number>`; `None` for placeholder rows.
    pub composite_id: Option<String>,
    pub part_number: Cell,
    pub raw_description: Cell,
    pub cleaned_description: Option<String>,
    /// Tariff lookup key.
    pub item_name: Option<String>,
    pub quantity: Cell,
    pub unit_price: Cell,
    pub tariff: Tariff,
}

impl LineItem {
    /// A row that carries no identity and no data (titles, invoice boundaries).
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self {
            item_number: Cell::text(label),
            source_group_id: None,
            composite_id: None,
            part_number: Cell::Empty,
            raw_description: Cell::Empty,
            cleaned_description: None,
            item_name: None,
            quantity: Cell::Empty,
            unit_price: Cell::Empty,
            tariff: Tariff::Blank,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.composite_id.is_none()
    }

    pub fn value(&self, field: Field) -> FieldValue {
        match field {
            Field::PartNumber => FieldValue::Cell(self.part_number.clone()),
            Field::Description => FieldValue::Cell(
                self.cleaned_description
                    .clone()
                    .map(Cell::Text)
                    .unwrap_or_default(),
            ),
            Field::Quantity => FieldValue::Cell(self.quantity.clone()),
            Field::Price => FieldValue::Cell(self.unit_price.clone()),
            Field::Hsn | Field::Bcd | Field::Sws | Field::Igst => self.tariff.value(field),
        }
    }
}

/// Normalized output of one side of the reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub source: String,
    /// Fields this source actually carries.
    pub fields: Vec<Field>,
    pub items: Vec<LineItem>,
}

impl RecordSet {
    pub fn new(source: impl Into<String>, fields: Vec<Field>, items: Vec<LineItem>) -> Self {
        Self { source: source.into(), fields, items }
    }

    pub fn empty(source: impl Into<String>) -> Self {
        Self::new(source, Field::ALL.to_vec(), Vec::new())
    }

    /// Items carrying a composite id.
    pub fn identified(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(|i| i.composite_id.is_some())
    }
}

/// An item name that resolved to no rate entry, with the id of its first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    pub item_name: String,
    pub first_seen_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Stage issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RateTable,
    Invoice,
    Checklist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::RateTable => write!(f, "rate_table"),
            Stage::Invoice => write!(f, "invoice"),
            Stage::Checklist => write!(f, "checklist"),
        }
    }
}

/// A stage-local failure that degraded the run instead of aborting it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageIssue {
    pub stage: Stage,
    pub message: String,
}

impl StageIssue {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }
}

// ---------------------------------------------------------------------------
// Difference report
// ---------------------------------------------------------------------------

/// One disagreeing field, rendered as `"<declared> -> <truth>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub declared: String,
    pub truth: String,
    /// False when the truth side is an unresolved tariff.
    pub truth_known: bool,
}

impl FieldChange {
    /// The truth-side value a correction should ask for, if there is one.
    pub fn requested_value(&self) -> Option<&str> {
        let truth = self.truth.trim();
        (self.truth_known && !truth.is_empty()).then_some(truth)
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.declared, self.truth)
    }
}

impl Serialize for FieldChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceRow {
    pub id: String,
    pub changes: BTreeMap<Field, FieldChange>,
}

impl DifferenceRow {
    pub fn get(&self, field: Field) -> Option<&FieldChange> {
        self.changes.get(&field)
    }
}

impl Serialize for DifferenceRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.changes.len() + 1))?;
        map.serialize_entry("ID", &self.id)?;
        for (field, change) in &self.changes {
            map.serialize_entry(field.label(), change)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffSummary {
    pub price_tolerance_pct: f64,
    pub truth_records: usize,
    pub declared_records: usize,
    pub truth_null_ids: usize,
    pub declared_null_ids: usize,
    pub truth_duplicates: usize,
    pub declared_duplicates: usize,
    pub compared: usize,
    pub only_in_truth: usize,
    pub differing: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DifferenceReport {
    /// Columns with at least one change, in schema order. `ID` is implicit.
    pub columns: Vec<Field>,
    pub rows: Vec<DifferenceRow>,
    pub summary: DiffSummary,
}

impl DifferenceReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_display_drops_integral_fraction() {
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(100.6).to_string(), "100.6");
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::text("8501.0").to_string(), "8501.0");
    }

    #[test]
    fn blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::text("   ").is_blank());
        assert!(Cell::Number(f64::NAN).is_blank());
        assert!(!Cell::Number(0.0).is_blank());
        assert!(!Cell::Bool(false).is_blank());
    }

    #[test]
    fn unmatched_tariff_surfaces_on_every_duty_field() {
        let mut item = LineItem::placeholder("x");
        item.tariff = Tariff::Unmatched;
        for field in [Field::Hsn, Field::Bcd, Field::Sws, Field::Igst] {
            assert_eq!(item.value(field), FieldValue::Unmatched);
        }
        assert_eq!(item.value(Field::Price), FieldValue::Cell(Cell::Empty));
    }

    #[test]
    fn difference_row_serializes_as_flat_object() {
        let mut changes = BTreeMap::new();
        changes.insert(
            Field::Price,
            FieldChange {
                declared: "103".into(),
                truth: "100".into(),
                truth_known: true,
            },
        );
        let row = DifferenceRow { id: "A_1".into(), changes };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"ID": "A_1", "Price": "103 -> 100"}));
    }

    #[test]
    fn requested_value_skips_unknown_and_empty_truth() {
        let unknown = FieldChange {
            declared: "8501".into(),
            truth: UNMATCHED_LABEL.into(),
            truth_known: false,
        };
        let empty = FieldChange {
            declared: "5".into(),
            truth: " ".into(),
            truth_known: true,
        };
        let known = FieldChange {
            declared: "5".into(),
            truth: "7.5".into(),
            truth_known: true,
        };
        assert_eq!(unknown.requested_value(), None);
        assert_eq!(empty.requested_value(), None);
        assert_eq!(known.requested_value(), Some("7.5"));
    }
}
