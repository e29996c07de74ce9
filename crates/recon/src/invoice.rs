//! Invoice workbooks to canonical line items.
//!
//! Every data sheet is one invoice group. The sheet name (minus a configured
//! prefix) is the group id, the header row becomes a title placeholder, and
//! each data row becomes a line item whose tariff is resolved by item name.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{InvoiceLayout, SheetContext};
use crate::error::ReconError;
use crate::model::{
    cell_at, row_is_blank, Cell, LineItem, RecordSet, Sheet, Stage, StageIssue, Tariff, Workbook,
};
use crate::tariff::TariffResolver;
use crate::text::{
    canonical_item_number, clean_invoice_description, item_name_from_description,
    leads_with_number, strip_group_prefix,
};

pub const SOURCE: &str = "invoice";

/// Per-workbook processing counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceFileStats {
    pub file: String,
    pub sheets_processed: usize,
    pub sheets_skipped: usize,
    pub items: usize,
    pub new_items: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceOutput {
    pub records: RecordSet,
    pub files: Vec<InvoiceFileStats>,
    pub issues: Vec<StageIssue>,
}

struct InvoiceColumnIndex {
    item_number: usize,
    part_number: usize,
    description: usize,
    quantity: usize,
    price: usize,
}

impl InvoiceColumnIndex {
    fn resolve(
        layout: &InvoiceLayout,
        header: &[Cell],
        ctx: SheetContext<'_>,
    ) -> Result<Self, ReconError> {
        let c = &layout.columns;
        Ok(Self {
            item_number: c.item_number.resolve(header, ctx, "item_number")?,
            part_number: c.part_number.resolve(header, ctx, "part_number")?,
            description: c.description.resolve(header, ctx, "description")?,
            quantity: c.quantity.resolve(header, ctx, "quantity")?,
            price: c.price.resolve(header, ctx, "price")?,
        })
    }
}

/// Normalize every workbook in order, sharing one resolver so a new item is
/// reported once across all of them.
pub fn normalize_invoices(
    workbooks: &[Workbook],
    layout: &InvoiceLayout,
    resolver: &mut TariffResolver<'_>,
) -> InvoiceOutput {
    let mut out = InvoiceOutput {
        records: RecordSet::empty(SOURCE),
        ..InvoiceOutput::default()
    };
    for workbook in workbooks {
        let (items, stats, issues) = normalize_invoice(workbook, layout, resolver);
        info!(
            file = %stats.file,
            sheets = stats.sheets_processed,
            items = stats.items,
            new_items = stats.new_items,
            "invoice processed"
        );
        out.records.items.extend(items);
        out.files.push(stats);
        out.issues.extend(issues);
    }
    out
}

/// Normalize one invoice workbook. A sheet whose columns cannot be resolved
/// is skipped and reported; the remaining sheets still contribute.
pub fn normalize_invoice(
    workbook: &Workbook,
    layout: &InvoiceLayout,
    resolver: &mut TariffResolver<'_>,
) -> (Vec<LineItem>, InvoiceFileStats, Vec<StageIssue>) {
    let mut stats = InvoiceFileStats {
        file: workbook.name.clone(),
        ..InvoiceFileStats::default()
    };
    let mut issues = Vec::new();
    let mut items = Vec::new();
    let unresolved_before = resolver.unresolved().len();

    let skip = usize::from(layout.skip_first_sheet);
    let sheets = workbook.sheets.get(skip..).unwrap_or(&[]);
    if sheets.is_empty() {
        warn!(file = %workbook.name, "invoice workbook has no data sheets");
        issues.push(StageIssue::new(
            Stage::Invoice,
            format!("{}: no invoice sheets", workbook.name),
        ));
    }

    let total = sheets.len();
    for (k, sheet) in sheets.iter().enumerate() {
        let group = strip_group_prefix(&sheet.name, &layout.group_prefixes);
        if group.is_empty() {
            warn!(
                file = %workbook.name,
                sheet = %sheet.name,
                "sheet name yields an empty group id"
            );
        }
        let title = format!("{group} Invoice {}/{total}", k + 1);
        match normalize_sheet(sheet, &group, title, layout, resolver) {
            Ok(sheet_items) => {
                stats.sheets_processed += 1;
                stats.items += sheet_items.iter().filter(|i| !i.is_placeholder()).count();
                items.extend(sheet_items);
            }
            Err(e) => {
                error!(
                    file = %workbook.name,
                    sheet = %sheet.name,
                    error = %e,
                    "invoice sheet skipped"
                );
                stats.sheets_skipped += 1;
                issues.push(StageIssue::new(Stage::Invoice, format!("{}: {e}", workbook.name)));
            }
        }
    }

    stats.new_items = resolver.unresolved().len() - unresolved_before;
    (items, stats, issues)
}

/// Normalize one invoice sheet belonging to `group`.
///
/// The header row is replaced by a placeholder labelled `title`. With
/// trailer skipping on, a blank row after data opens a footer block that
/// lasts until a row whose item number leads with a number.
pub fn normalize_sheet(
    sheet: &Sheet,
    group: &str,
    title: String,
    layout: &InvoiceLayout,
    resolver: &mut TariffResolver<'_>,
) -> Result<Vec<LineItem>, ReconError> {
    let rows = sheet.rows.get(layout.skip_rows..).unwrap_or(&[]);
    let Some((header, body)) = rows.split_first() else {
        warn!(sheet = %sheet.name, "invoice sheet is empty");
        return Ok(Vec::new());
    };

    let ctx = SheetContext {
        source: SOURCE,
        sheet: &sheet.name,
        width: sheet.width(),
    };
    let cols = InvoiceColumnIndex::resolve(layout, header, ctx)?;

    let mut items = vec![LineItem::placeholder(title)];
    let mut seen_data = false;
    let mut in_trailer = false;
    let mut trailer_rows = 0usize;

    for row in body {
        if row_is_blank(row) {
            if layout.skip_trailer_blocks && seen_data {
                in_trailer = true;
            }
            continue;
        }
        if in_trailer {
            if leads_with_number(cell_at(row, cols.item_number)) {
                in_trailer = false;
            } else {
                trailer_rows += 1;
                continue;
            }
        }
        seen_data = true;
        items.push(line_item(row, &cols, group, resolver));
    }

    if trailer_rows > 0 {
        debug!(sheet = %sheet.name, rows = trailer_rows, "trailer rows skipped");
    }
    Ok(items)
}

fn line_item(
    row: &[Cell],
    cols: &InvoiceColumnIndex,
    group: &str,
    resolver: &mut TariffResolver<'_>,
) -> LineItem {
    let item_number = cell_at(row, cols.item_number).clone();
    let composite_id = canonical_item_number(&item_number).map(|n| format!("{group}_{n}"));

    let raw_description = cell_at(row, cols.description).clone();
    let description = (!raw_description.is_blank()).then(|| raw_description.to_string());
    let item_name = description.as_deref().and_then(item_name_from_description);

    let tariff = match item_name.as_deref() {
        Some(name) => resolver.resolve(name, composite_id.as_deref()),
        None => Tariff::Blank,
    };

    LineItem {
        item_number,
        source_group_id: Some(group.to_string()),
        composite_id,
        part_number: cell_at(row, cols.part_number).clone(),
        cleaned_description: description.as_deref().map(clean_invoice_description),
        raw_description,
        item_name,
        quantity: cell_at(row, cols.quantity).clone(),
        unit_price: cell_at(row, cols.price).clone(),
        tariff,
    }
}
