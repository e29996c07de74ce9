use std::fmt;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{cell_at, Cell};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub name: String,
    pub tolerance: ToleranceConfig,
    pub rate_table: RateTableLayout,
    pub invoice: InvoiceLayout,
    pub checklist: ChecklistLayout,
    pub inputs: InputConfig,
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Column specs
// ---------------------------------------------------------------------------

/// Where a column lives in a sheet.
///
/// ```toml
/// item_number = 0                                 # by position
/// part_number = "P/N"                             # by header text
/// price = { index = 6, header = "Unit Price" }    # position, checked against header
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Index(usize),
    Header(String),
    Pinned { index: usize, header: String },
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Header(h) => write!(f, "\"{h}\""),
            Self::Pinned { index, header } => write!(f, "#{index} \"{header}\""),
        }
    }
}

fn header_matches(cell: &Cell, header: &str) -> bool {
    cell.to_string().trim().eq_ignore_ascii_case(header.trim())
}

/// Identifies the sheet a column is being resolved against, for error messages.
#[derive(Debug, Clone, Copy)]
pub struct SheetContext<'a> {
    pub source: &'a str,
    pub sheet: &'a str,
    pub width: usize,
}

impl ColumnSpec {
    /// Resolve to a column index using the sheet's header row.
    pub fn resolve(
        &self,
        header_row: &[Cell],
        ctx: SheetContext<'_>,
        column: &str,
    ) -> Result<usize, ReconError> {
        let mismatch = |reason: String| ReconError::schema(ctx.source, ctx.sheet, column, reason);
        match self {
            Self::Index(i) if *i < ctx.width => Ok(*i),
            Self::Index(i) => Err(mismatch(format!(
                "column index {i} is outside the sheet width {}",
                ctx.width
            ))),
            Self::Header(h) => header_row
                .iter()
                .position(|c| header_matches(c, h))
                .ok_or_else(|| mismatch(format!("header \"{h}\" not found"))),
            Self::Pinned { index, header } => {
                if *index >= ctx.width {
                    return Err(mismatch(format!(
                        "column index {index} is outside the sheet width {}",
                        ctx.width
                    )));
                }
                let found = cell_at(header_row, *index);
                if header_matches(found, header) {
                    Ok(*index)
                } else {
                    Err(mismatch(format!(
                        "expected header \"{header}\" at column {index}, found \"{found}\""
                    )))
                }
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but a header that is simply absent
    /// yields `None` instead of an error. Index mismatches still fail.
    pub fn resolve_optional(
        &self,
        header_row: &[Cell],
        ctx: SheetContext<'_>,
        column: &str,
    ) -> Result<Option<usize>, ReconError> {
        match self {
            Self::Header(h) if !header_row.iter().any(|c| header_matches(c, h)) => Ok(None),
            _ => self.resolve(header_row, ctx, column).map(Some),
        }
    }
}

fn header(name: &str) -> ColumnSpec {
    ColumnSpec::Header(name.to_string())
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

/// Price tolerance as a percentage of the truth-side price.
pub const DEFAULT_PRICE_TOLERANCE_PCT: f64 = 1.1;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub price_pct: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            price_pct: DEFAULT_PRICE_TOLERANCE_PCT,
        }
    }
}

// ---------------------------------------------------------------------------
// Rate table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateTableLayout {
    /// Sheet to read; the first sheet when unset.
    pub sheet: Option<String>,
    pub item_name: String,
    pub hsn_primary: String,
    pub hsn_secondary: String,
    pub bcd: String,
    pub sws: String,
    pub igst: String,
}

impl Default for RateTableLayout {
    fn default() -> Self {
        Self {
            sheet: None,
            item_name: "Item Name".into(),
            hsn_primary: "HSN1".into(),
            hsn_secondary: "HSN2".into(),
            bcd: "Final BCD".into(),
            sws: "Final SWS".into(),
            igst: "Final IGST".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Invoice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvoiceLayout {
    /// Rows above the header row on every invoice sheet.
    pub skip_rows: usize,
    /// The first sheet of each invoice workbook is a cover page.
    pub skip_first_sheet: bool,
    /// Removed from sheet names to obtain the group id.
    pub group_prefixes: Vec<String>,
    /// Drop footer blocks (totals, bank details) that follow a blank row.
    pub skip_trailer_blocks: bool,
    pub columns: InvoiceColumns,
}

impl Default for InvoiceLayout {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            skip_first_sheet: true,
            group_prefixes: vec!["CI-".into()],
            skip_trailer_blocks: true,
            columns: InvoiceColumns::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvoiceColumns {
    pub item_number: ColumnSpec,
    pub part_number: ColumnSpec,
    pub description: ColumnSpec,
    pub quantity: ColumnSpec,
    pub price: ColumnSpec,
}

impl Default for InvoiceColumns {
    fn default() -> Self {
        Self {
            item_number: ColumnSpec::Index(0),
            part_number: ColumnSpec::Index(2),
            description: ColumnSpec::Index(3),
            quantity: ColumnSpec::Index(5),
            price: ColumnSpec::Index(6),
        }
    }
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChecklistLayout {
    /// Sheet to read; the first sheet when unset.
    pub sheet: Option<String>,
    /// Rows above the header row.
    pub skip_rows: usize,
    /// Text that opens an invoice boundary row.
    pub marker: String,
    /// Text that closes the group id on a boundary row.
    pub marker_end: String,
    /// Column searched for the marker.
    pub marker_column: ColumnSpec,
    pub columns: ChecklistColumns,
}

impl Default for ChecklistLayout {
    fn default() -> Self {
        Self {
            sheet: None,
            skip_rows: 3,
            marker: "Invoice:".into(),
            marker_end: "dt.".into(),
            marker_column: header("P/N"),
            columns: ChecklistColumns::default(),
        }
    }
}

/// Checklist columns. Everything except the item number is optional: a
/// header-name spec whose header is missing leaves that field absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChecklistColumns {
    pub item_number: ColumnSpec,
    pub part_number: ColumnSpec,
    pub description: ColumnSpec,
    pub quantity: ColumnSpec,
    pub price: ColumnSpec,
    pub hsn: ColumnSpec,
    pub bcd: ColumnSpec,
    pub sws: ColumnSpec,
    pub igst: ColumnSpec,
}

impl Default for ChecklistColumns {
    fn default() -> Self {
        Self {
            item_number: header("Item#"),
            part_number: header("P/N"),
            description: header("Desc"),
            quantity: header("Qty"),
            price: header("Price"),
            hsn: header("HSN"),
            bcd: header("Duty"),
            sws: header("Welfare"),
            igst: header("IGST"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs + Output
// ---------------------------------------------------------------------------

/// Input files, relative to the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub rate_table: Option<String>,
    pub checklist: Option<String>,
    pub invoices: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub invoices: String,
    pub checklist: String,
    pub report: String,
    pub new_items: String,
    pub summary: String,
    pub draft: Option<String>,
    pub json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".into(),
            invoices: "processed_invoices.xlsx".into(),
            checklist: "processed_checklist.xlsx".into(),
            report: "processed_report.xlsx".into(),
            new_items: "added_new_items.xlsx".into(),
            summary: "processing_summary.xlsx".into(),
            draft: None,
            json: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(msg));

        let pct = self.tolerance.price_pct;
        if !pct.is_finite() || pct < 0.0 {
            return invalid(format!(
                "tolerance.price_pct must be a non-negative number, got {pct}"
            ));
        }

        if self.checklist.marker.trim().is_empty() {
            return invalid("checklist.marker must not be empty".into());
        }

        if self.invoice.group_prefixes.iter().any(|p| p.is_empty()) {
            return invalid("invoice.group_prefixes must not contain empty strings".into());
        }

        let rate = &self.rate_table;
        for (key, value) in [
            ("item_name", &rate.item_name),
            ("hsn_primary", &rate.hsn_primary),
            ("hsn_secondary", &rate.hsn_secondary),
            ("bcd", &rate.bcd),
            ("sws", &rate.sws),
            ("igst", &rate.igst),
        ] {
            if value.trim().is_empty() {
                return invalid(format!("rate_table.{key} must name a header"));
            }
        }

        let out = &self.output;
        for (key, value) in [
            ("invoices", &out.invoices),
            ("checklist", &out.checklist),
            ("report", &out.report),
            ("new_items", &out.new_items),
            ("summary", &out.summary),
        ] {
            if value.trim().is_empty() {
                return invalid(format!("output.{key} must not be empty"));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
