//! Field-by-field reconciliation of the truth set (invoices) against the
//! declared set (checklist), keyed by composite id.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::model::{
    Cell, DiffSummary, DifferenceReport, DifferenceRow, Field, FieldChange, FieldKind, FieldValue,
    LineItem, RecordSet,
};
use crate::text::canonical_hsn;

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Items keyed by composite id, first occurrence kept.
#[derive(Debug, Default)]
pub struct Deduped<'a> {
    pub unique: Vec<(&'a str, &'a LineItem)>,
    pub duplicates: usize,
    pub null_ids: usize,
}

pub fn dedupe_by_id(items: &[LineItem]) -> Deduped<'_> {
    let mut out = Deduped::default();
    let mut seen: HashSet<&str> = HashSet::new();
    for item in items {
        match item.composite_id.as_deref() {
            None => out.null_ids += 1,
            Some(id) if seen.insert(id) => out.unique.push((id, item)),
            Some(_) => out.duplicates += 1,
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Value comparison
// ---------------------------------------------------------------------------

/// Epsilon-inclusive `|a - b| <= allowed`, scaled to the operands so decimal
/// boundaries like `100.5` against `100` at 0.5% hold under IEEE-754.
fn within(a: f64, b: f64, allowed: f64) -> bool {
    let delta = (a - b).abs();
    let scale = 1.0_f64.max(a.abs()).max(b.abs()).max(delta).max(allowed);
    delta <= allowed + f64::EPSILON * 16.0 * scale
}

/// Price disagrees when it is non-numeric on either side, or when the
/// absolute difference exceeds `pct` percent of the truth price.
pub fn price_differs(truth: &Cell, declared: &Cell, pct: f64) -> bool {
    match (truth.as_number(), declared.as_number()) {
        (Some(t), Some(d)) => !within(t, d, t.abs() * pct / 100.0),
        _ => true,
    }
}

fn text_key(cell: &Cell) -> String {
    cell.to_string().trim().to_lowercase()
}

fn cells_differ(kind: FieldKind, truth: &Cell, declared: &Cell, pct: f64) -> bool {
    match kind {
        FieldKind::Price => price_differs(truth, declared, pct),
        FieldKind::Hsn => canonical_hsn(&truth.to_string()) != canonical_hsn(&declared.to_string()),
        FieldKind::Numeric => match (truth.as_number(), declared.as_number()) {
            (Some(t), Some(d)) => !within(t, d, 0.0),
            _ => text_key(truth) != text_key(declared),
        },
        FieldKind::Text => text_key(truth) != text_key(declared),
    }
}

/// Canonical rendering used to suppress changes that only differ in form.
fn render_key(field: Field, value: &FieldValue) -> String {
    let text = value.to_string();
    match field.kind() {
        FieldKind::Hsn => canonical_hsn(&text),
        _ => text.trim().to_lowercase(),
    }
}

/// Compare one field. `None` means the field agrees or is blank on both sides.
pub fn compare_field(
    field: Field,
    truth: &FieldValue,
    declared: &FieldValue,
    price_tolerance_pct: f64,
) -> Option<FieldChange> {
    if truth.is_blank() && declared.is_blank() {
        return None;
    }
    let differs = match (truth, declared) {
        (FieldValue::Unmatched, FieldValue::Unmatched) => false,
        (FieldValue::Unmatched, _) | (_, FieldValue::Unmatched) => true,
        (FieldValue::Cell(t), FieldValue::Cell(d)) => {
            cells_differ(field.kind(), t, d, price_tolerance_pct)
        }
    };
    if !differs || render_key(field, truth) == render_key(field, declared) {
        return None;
    }
    Some(FieldChange {
        declared: declared.to_string(),
        truth: truth.to_string(),
        truth_known: !matches!(truth, FieldValue::Unmatched),
    })
}

// ---------------------------------------------------------------------------
// Core reconciliation
// ---------------------------------------------------------------------------

/// Reconcile `truth` against `declared`.
///
/// Both sides are deduplicated by composite id (first occurrence wins) and
/// items without an id are discarded. Only fields present in both sets are
/// compared. Truth ids missing from the declared side are counted, never
/// reported as rows. Declared-only ids are ignored.
pub fn reconcile(
    truth: &RecordSet,
    declared: &RecordSet,
    price_tolerance_pct: f64,
) -> DifferenceReport {
    let truth_ids = dedupe_by_id(&truth.items);
    let declared_ids = dedupe_by_id(&declared.items);
    for (set, d) in [(truth, &truth_ids), (declared, &declared_ids)] {
        if d.duplicates > 0 {
            warn!(
                source = %set.source,
                duplicates = d.duplicates,
                "duplicate ids dropped, first occurrence kept"
            );
        }
    }

    let fields: Vec<Field> = Field::ALL
        .into_iter()
        .filter(|f| truth.fields.contains(f) && declared.fields.contains(f))
        .collect();

    let declared_index: HashMap<&str, &LineItem> = declared_ids.unique.iter().copied().collect();

    let mut rows = Vec::new();
    let mut compared = 0usize;
    let mut only_in_truth = 0usize;

    for (id, truth_item) in &truth_ids.unique {
        let Some(declared_item) = declared_index.get(id) else {
            debug!(id = *id, "id missing from declared set");
            only_in_truth += 1;
            continue;
        };
        compared += 1;

        let mut changes = BTreeMap::new();
        for &field in &fields {
            let t = truth_item.value(field);
            let d = declared_item.value(field);
            if let Some(change) = compare_field(field, &t, &d, price_tolerance_pct) {
                debug!(id = *id, field = %field, change = %change, "field differs");
                changes.insert(field, change);
            }
        }
        if !changes.is_empty() {
            rows.push(DifferenceRow { id: id.to_string(), changes });
        }
    }

    let columns: Vec<Field> = fields
        .into_iter()
        .filter(|f| rows.iter().any(|r| r.changes.contains_key(f)))
        .collect();

    let summary = DiffSummary {
        price_tolerance_pct,
        truth_records: truth_ids.unique.len() + truth_ids.duplicates,
        declared_records: declared_ids.unique.len() + declared_ids.duplicates,
        truth_null_ids: truth_ids.null_ids,
        declared_null_ids: declared_ids.null_ids,
        truth_duplicates: truth_ids.duplicates,
        declared_duplicates: declared_ids.duplicates,
        compared,
        only_in_truth,
        differing: rows.len(),
    };
    info!(
        compared = summary.compared,
        differing = summary.differing,
        only_in_truth = summary.only_in_truth,
        "reconciliation complete"
    );

    DifferenceReport { columns, rows, summary }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
