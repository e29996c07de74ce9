//! Customs checklist to canonical line items.
//!
//! The checklist is one flat sheet. Boundary rows carry the marker text
//! (`Invoice: <group> dt. ...`) and switch the active group; data rows in
//! between belong to it. Rows before the first boundary have no group and
//! are dropped.

use tracing::{debug, info, warn};

use crate::config::{ChecklistLayout, ColumnSpec, SheetContext};
use crate::error::ReconError;
use crate::model::{
    cell_at, row_is_blank, Cell, DeclaredDuty, Field, LineItem, RecordSet, Sheet, Tariff, Workbook,
};
use crate::tariff::TariffResolver;
use crate::text::{
    clean_checklist_description, extract_marker_group, integer_item_number,
    item_name_from_description,
};

pub const SOURCE: &str = "checklist";

// ---------------------------------------------------------------------------
// Row state machine
// ---------------------------------------------------------------------------

/// What a checklist row looks like before any state is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSignal {
    /// Marker row; `None` when no group id follows the marker.
    Boundary(Option<String>),
    Data,
    Blank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChecklistState {
    /// Before the first boundary, or after a boundary without a group id.
    #[default]
    Unused,
    AwaitingItem { group: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowAction {
    /// Emit a placeholder for the boundary row.
    Boundary,
    /// Emit a line item in `group`.
    Item { group: String },
    Drop,
}

impl ChecklistState {
    pub fn step(&mut self, signal: RowSignal) -> RowAction {
        match signal {
            RowSignal::Boundary(Some(group)) => {
                *self = ChecklistState::AwaitingItem { group };
                RowAction::Boundary
            }
            RowSignal::Boundary(None) => {
                *self = ChecklistState::Unused;
                RowAction::Boundary
            }
            RowSignal::Data => match self {
                ChecklistState::AwaitingItem { group } => RowAction::Item { group: group.clone() },
                ChecklistState::Unused => RowAction::Drop,
            },
            RowSignal::Blank => RowAction::Drop,
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

struct ChecklistColumnIndex {
    item_number: usize,
    marker: usize,
    part_number: Option<usize>,
    description: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
    hsn: Option<usize>,
    bcd: Option<usize>,
    sws: Option<usize>,
    igst: Option<usize>,
}

impl ChecklistColumnIndex {
    fn resolve(
        layout: &ChecklistLayout,
        header: &[Cell],
        ctx: SheetContext<'_>,
    ) -> Result<Self, ReconError> {
        let c = &layout.columns;
        let optional = |spec: &ColumnSpec, name: &str| -> Result<Option<usize>, ReconError> {
            let found = spec.resolve_optional(header, ctx, name)?;
            if found.is_none() {
                warn!(column = name, spec = %spec, "checklist column absent");
            }
            Ok(found)
        };
        Ok(Self {
            item_number: c.item_number.resolve(header, ctx, "item_number")?,
            marker: layout.marker_column.resolve(header, ctx, "marker_column")?,
            part_number: optional(&c.part_number, "part_number")?,
            description: optional(&c.description, "description")?,
            quantity: optional(&c.quantity, "quantity")?,
            price: optional(&c.price, "price")?,
            hsn: optional(&c.hsn, "hsn")?,
            bcd: optional(&c.bcd, "bcd")?,
            sws: optional(&c.sws, "sws")?,
            igst: optional(&c.igst, "igst")?,
        })
    }

    fn fields(&self) -> Vec<Field> {
        [
            (Field::PartNumber, self.part_number),
            (Field::Description, self.description),
            (Field::Hsn, self.hsn),
            (Field::Bcd, self.bcd),
            (Field::Sws, self.sws),
            (Field::Igst, self.igst),
            (Field::Quantity, self.quantity),
            (Field::Price, self.price),
        ]
        .into_iter()
        .filter_map(|(field, col)| col.map(|_| field))
        .collect()
    }
}

fn optional_cell(row: &[Cell], col: Option<usize>) -> Cell {
    col.map(|c| cell_at(row, c).clone()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

/// Pick the configured sheet (or the first) and normalize it.
pub fn normalize_checklist_workbook(
    workbook: &Workbook,
    layout: &ChecklistLayout,
    resolver: &mut TariffResolver<'_>,
) -> Result<RecordSet, ReconError> {
    let sheet = match &layout.sheet {
        Some(name) => workbook.sheet(name).ok_or_else(|| ReconError::MissingSheet {
            source_name: workbook.name.clone(),
            sheet: name.clone(),
        })?,
        None => workbook.sheets.first().ok_or_else(|| ReconError::EmptyInput {
            source_name: workbook.name.clone(),
        })?,
    };
    normalize_checklist(sheet, layout, resolver)
}

/// Normalize the checklist sheet.
///
/// Declared duties are kept as written. Item names still go through the
/// resolver so names missing from the rate table are reported.
pub fn normalize_checklist(
    sheet: &Sheet,
    layout: &ChecklistLayout,
    resolver: &mut TariffResolver<'_>,
) -> Result<RecordSet, ReconError> {
    let rows = sheet.rows.get(layout.skip_rows..).unwrap_or(&[]);
    let Some((header, body)) = rows.split_first() else {
        return Err(ReconError::EmptyInput {
            source_name: format!("{SOURCE} sheet '{}'", sheet.name),
        });
    };

    let ctx = SheetContext {
        source: SOURCE,
        sheet: &sheet.name,
        width: sheet.width(),
    };
    let cols = ChecklistColumnIndex::resolve(layout, header, ctx)?;

    let mut state = ChecklistState::default();
    let mut items = Vec::new();
    let mut dropped = 0usize;
    let mut unnumbered = 0usize;

    for row in body {
        let marker_cell = cell_at(row, cols.marker);
        let text = marker_cell.to_string();
        let signal = if row_is_blank(row) {
            RowSignal::Blank
        } else if text.contains(layout.marker.as_str()) {
            RowSignal::Boundary(extract_marker_group(&text, &layout.marker, &layout.marker_end))
        } else if cell_at(row, cols.item_number).is_blank() {
            // Continuation lines and notes carry no item number.
            unnumbered += 1;
            RowSignal::Blank
        } else {
            RowSignal::Data
        };
        let is_data = signal == RowSignal::Data;

        match state.step(signal) {
            RowAction::Boundary => {
                if state == ChecklistState::Unused {
                    warn!(row = %marker_cell, "boundary row without a group id");
                }
                items.push(LineItem::placeholder(marker_cell.to_string()));
            }
            RowAction::Item { group } => items.push(line_item(row, &cols, group, resolver)),
            RowAction::Drop => {
                if is_data {
                    dropped += 1;
                }
            }
        }
    }

    if dropped > 0 {
        debug!(rows = dropped, "checklist rows outside any invoice dropped");
    }
    if unnumbered > 0 {
        debug!(rows = unnumbered, "checklist rows without an item number dropped");
    }
    let record_count = items.iter().filter(|i| !i.is_placeholder()).count();
    info!(sheet = %sheet.name, items = record_count, "checklist processed");

    Ok(RecordSet::new(SOURCE, cols.fields(), items))
}

fn line_item(
    row: &[Cell],
    cols: &ChecklistColumnIndex,
    group: String,
    resolver: &mut TariffResolver<'_>,
) -> LineItem {
    let item_number = cell_at(row, cols.item_number).clone();
    let composite_id = integer_item_number(&item_number).map(|n| format!("{group}_{n}"));

    let raw_description = optional_cell(row, cols.description);
    let description = (!raw_description.is_blank()).then(|| raw_description.to_string());
    let item_name = description.as_deref().and_then(item_name_from_description);
    if let Some(name) = item_name.as_deref() {
        resolver.resolve(name, composite_id.as_deref());
    }

    LineItem {
        item_number,
        source_group_id: Some(group),
        composite_id,
        part_number: optional_cell(row, cols.part_number),
        cleaned_description: description.as_deref().map(clean_checklist_description),
        raw_description,
        item_name,
        quantity: optional_cell(row, cols.quantity),
        unit_price: optional_cell(row, cols.price),
        tariff: Tariff::Declared(DeclaredDuty {
            hsn: optional_cell(row, cols.hsn),
            bcd: optional_cell(row, cols.bcd),
            sws: optional_cell(row, cols.sws),
            igst: optional_cell(row, cols.igst),
        }),
    }
}
