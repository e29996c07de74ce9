use serde::Serialize;
use tracing::{error, info, warn};

use crate::checklist::{self, normalize_checklist_workbook};
use crate::config::{RateTableLayout, ReconConfig};
use crate::diff::reconcile;
use crate::error::ReconError;
use crate::invoice::{normalize_invoices, InvoiceFileStats};
use crate::model::{DifferenceReport, NewItem, RecordSet, Sheet, Stage, StageIssue, Workbook};
use crate::notify;
use crate::tariff::{TariffResolver, TariffTable};

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Pre-loaded inputs. A `None` source is one that could not be read; the
/// loader records why in `issues`.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub rate_table: Option<Workbook>,
    pub invoices: Vec<Workbook>,
    pub checklist: Option<Workbook>,
    pub issues: Vec<StageIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub price_tolerance_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub tariff_entries: usize,
    pub invoice_files: usize,
    pub invoice_items: usize,
    pub checklist_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub meta: RunMeta,
    pub counts: RunCounts,
    pub invoice_files: Vec<InvoiceFileStats>,
    /// Invoice item names with no rate entry, in first-seen order.
    pub new_items: Vec<NewItem>,
    /// Checklist item names with no rate entry.
    pub checklist_new_items: Vec<NewItem>,
    pub issues: Vec<StageIssue>,
    pub report: DifferenceReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(skip)]
    pub invoices: RecordSet,
    #[serde(skip)]
    pub checklist: RecordSet,
}

impl RunOutput {
    /// A stage failed or an input was missing; results are partial.
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.report.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Pick the configured rate sheet, or the first one.
pub fn rate_sheet<'w>(
    workbook: &'w Workbook,
    layout: &RateTableLayout,
) -> Result<&'w Sheet, ReconError> {
    match &layout.sheet {
        Some(name) => workbook.sheet(name).ok_or_else(|| ReconError::MissingSheet {
            source_name: workbook.name.clone(),
            sheet: name.clone(),
        }),
        None => workbook.sheets.first().ok_or_else(|| ReconError::EmptyInput {
            source_name: workbook.name.clone(),
        }),
    }
}

/// Build the tariff table from a rate workbook.
pub fn load_tariffs(
    workbook: &Workbook,
    layout: &RateTableLayout,
) -> Result<TariffTable, ReconError> {
    let sheet = rate_sheet(workbook, layout)?;
    TariffTable::from_sheet(sheet, layout)
}

/// Run every stage. Stage failures degrade the run instead of aborting it:
/// the failing stage contributes an empty result and a [`StageIssue`].
pub fn run(config: &ReconConfig, input: &RunInput) -> RunOutput {
    let mut issues = input.issues.clone();

    let tariffs = match &input.rate_table {
        Some(workbook) => match load_tariffs(workbook, &config.rate_table) {
            Ok(table) => table,
            Err(e) => {
                error!(error = %e, "rate table unusable, every item will be unmatched");
                issues.push(StageIssue::new(Stage::RateTable, e.to_string()));
                TariffTable::default()
            }
        },
        None => {
            warn!("no rate table loaded");
            TariffTable::default()
        }
    };
    info!(entries = tariffs.len(), "tariff table ready");

    let mut invoice_resolver = TariffResolver::new(&tariffs);
    let invoice_out = normalize_invoices(&input.invoices, &config.invoice, &mut invoice_resolver);
    let new_items = invoice_resolver.into_unresolved();
    issues.extend(invoice_out.issues);

    let mut checklist_resolver = TariffResolver::new(&tariffs);
    let checklist = match &input.checklist {
        Some(workbook) => {
            let layout = &config.checklist;
            match normalize_checklist_workbook(workbook, layout, &mut checklist_resolver) {
                Ok(set) => set,
                Err(e) => {
                    error!(error = %e, "checklist unusable");
                    issues.push(StageIssue::new(Stage::Checklist, e.to_string()));
                    RecordSet::empty(checklist::SOURCE)
                }
            }
        }
        None => {
            warn!("no checklist loaded");
            RecordSet::empty(checklist::SOURCE)
        }
    };
    let checklist_new_items = checklist_resolver.into_unresolved();

    let report = reconcile(&invoice_out.records, &checklist, config.tolerance.price_pct);
    let draft = notify::draft(&report);

    let counts = RunCounts {
        tariff_entries: tariffs.len(),
        invoice_files: invoice_out.files.len(),
        invoice_items: invoice_out.records.identified().count(),
        checklist_items: checklist.identified().count(),
    };

    RunOutput {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            price_tolerance_pct: config.tolerance.price_pct,
        },
        counts,
        invoice_files: invoice_out.files,
        new_items,
        checklist_new_items,
        issues,
        report,
        draft,
        invoices: invoice_out.records,
        checklist,
    }
}
