//! `dutycheck run`, `validate` and `resolve`.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::{info, warn};

use dutycheck_io::{read_workbook, write_tables};
use dutycheck_recon::engine::{load_tariffs, rate_sheet, RunInput, RunOutput};
use dutycheck_recon::export::{
    line_items_table, new_items_table, report_table, sheet_table, summary_table, Table,
};
use dutycheck_recon::model::{Stage, StageIssue, Workbook};
use dutycheck_recon::tariff::{normalize_item_name, MatchKind};
use dutycheck_recon::ReconConfig;

use crate::exit_codes::{EXIT_DEGRADED, EXIT_DISCREPANCIES, EXIT_INVALID_CONFIG};
use crate::CliError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Rate table workbook (overrides [inputs] rate_table)
    #[arg(long, value_name = "FILE")]
    pub rates: Option<PathBuf>,

    /// Customs checklist workbook (overrides [inputs] checklist)
    #[arg(long, value_name = "FILE")]
    pub checklist: Option<PathBuf>,

    /// Invoice workbook. Repeatable; replaces [inputs] invoices when given.
    #[arg(long = "invoice", value_name = "FILE")]
    pub invoices: Vec<PathBuf>,

    /// Price tolerance in percent (overrides [tolerance] price_pct)
    #[arg(long, value_name = "PCT")]
    pub tolerance: Option<f64>,

    /// Directory for output workbooks (overrides [output] dir)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Output JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Write JSON output to file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the correction request to a text file
    #[arg(long, value_name = "FILE")]
    pub draft: Option<PathBuf>,

    /// Print the correction request to stderr
    #[arg(long)]
    pub show_draft: bool,
}

// ============================================================================
// Config + inputs
// ============================================================================

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        CliError::usage(format!("cannot read config {}: {e}", path.display()))
    })?;
    ReconConfig::from_toml(&config_str)
        .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, e.to_string()))
}

/// Config-relative paths resolve against the config file's directory.
fn base_dir(config_path: Option<&Path>) -> PathBuf {
    config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug)]
struct Sources {
    rate_table: Option<PathBuf>,
    checklist: Option<PathBuf>,
    invoices: Vec<PathBuf>,
}

impl Sources {
    fn resolve(config: &ReconConfig, base: &Path, args: &RunArgs) -> Self {
        let from_config = |p: &String| base.join(p);
        Self {
            rate_table: args
                .rates
                .clone()
                .or_else(|| config.inputs.rate_table.as_ref().map(from_config)),
            checklist: args
                .checklist
                .clone()
                .or_else(|| config.inputs.checklist.as_ref().map(from_config)),
            invoices: if args.invoices.is_empty() {
                config.inputs.invoices.iter().map(from_config).collect()
            } else {
                args.invoices.clone()
            },
        }
    }
}

fn load_one(stage: Stage, path: &Path, issues: &mut Vec<StageIssue>) -> Option<Workbook> {
    match read_workbook(path) {
        Ok(workbook) => Some(workbook),
        Err(e) => {
            warn!(%stage, error = %e, "input unreadable");
            issues.push(StageIssue::new(stage, e.to_string()));
            None
        }
    }
}

/// Read every input. An unreadable or missing input becomes a stage issue.
fn load_inputs(sources: &Sources) -> RunInput {
    let mut issues = Vec::new();

    let rate_table = match &sources.rate_table {
        Some(path) => load_one(Stage::RateTable, path, &mut issues),
        None => {
            issues.push(StageIssue::new(Stage::RateTable, "no rate table given"));
            None
        }
    };

    let invoices: Vec<Workbook> = sources
        .invoices
        .iter()
        .filter_map(|path| load_one(Stage::Invoice, path, &mut issues))
        .collect();
    if sources.invoices.is_empty() {
        issues.push(StageIssue::new(Stage::Invoice, "no invoice files given"));
    }

    let checklist = match &sources.checklist {
        Some(path) => load_one(Stage::Checklist, path, &mut issues),
        None => {
            issues.push(StageIssue::new(Stage::Checklist, "no checklist given"));
            None
        }
    };

    RunInput { rate_table, invoices, checklist, issues }
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(config_path: Option<PathBuf>, args: RunArgs) -> Result<(), CliError> {
    let mut config = match &config_path {
        Some(path) => load_config(path)?,
        None => ReconConfig::default(),
    };
    if let Some(pct) = args.tolerance {
        config.tolerance.price_pct = pct;
        config
            .validate()
            .map_err(|e| CliError::usage(format!("--tolerance: {e}")))?;
    }

    let base = base_dir(config_path.as_deref());
    let sources = Sources::resolve(&config, &base, &args);
    if sources.invoices.is_empty() && sources.checklist.is_none() {
        return Err(CliError::usage("nothing to reconcile: no invoice or checklist input")
            .with_hint("pass --invoice/--checklist or list them under [inputs] in the config"));
    }

    let input = load_inputs(&sources);
    let output = dutycheck_recon::run(&config, &input);

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| base.join(&config.output.dir));
    write_outputs(&config, &input, &output, &out_dir)?;

    let draft_path = args
        .draft
        .clone()
        .or_else(|| config.output.draft.as_ref().map(|d| out_dir.join(d)));
    if let (Some(path), Some(draft)) = (&draft_path, &output.draft) {
        write_text(path, draft)?;
    }

    let json_path = args
        .output
        .clone()
        .or_else(|| config.output.json.as_ref().map(|j| out_dir.join(j)));
    if args.json || json_path.is_some() {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::write(format!("JSON serialization error: {e}")))?;
        if let Some(path) = &json_path {
            write_text(path, &json_str)?;
        }
        if args.json {
            println!("{json_str}");
        }
    }

    print_summary(&output, &out_dir);
    if args.show_draft {
        if let Some(draft) = &output.draft {
            eprintln!();
            eprintln!("{draft}");
        }
    }

    outcome(&output)
}

fn outcome(output: &RunOutput) -> Result<(), CliError> {
    if output.is_degraded() {
        return Err(CliError::new(
            EXIT_DEGRADED,
            format!("degraded run: {} stage issue(s)", output.issues.len()),
        ));
    }
    if output.has_discrepancies() {
        return Err(CliError::new(
            EXIT_DISCREPANCIES,
            format!("{} item(s) need revision", output.report.rows.len()),
        ));
    }
    Ok(())
}

fn write(tables: &[Table], path: &Path) -> Result<(), CliError> {
    write_tables(tables, path).map_err(|e| CliError::write(e.to_string()))?;
    info!(path = %path.display(), "wrote");
    Ok(())
}

fn write_text(path: &Path, contents: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::write(format!("cannot create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, contents)
        .map_err(|e| CliError::write(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), "wrote");
    Ok(())
}

/// Processed sources and summary always; report and new items only when
/// they have rows.
fn write_outputs(
    config: &ReconConfig,
    input: &RunInput,
    output: &RunOutput,
    out_dir: &Path,
) -> Result<(), CliError> {
    let names = &config.output;

    write(
        &[line_items_table("Invoices", &output.invoices)],
        &out_dir.join(&names.invoices),
    )?;
    write(
        &[line_items_table("Checklist", &output.checklist)],
        &out_dir.join(&names.checklist),
    )?;

    if !output.report.is_empty() {
        write(&[report_table(&output.report)], &out_dir.join(&names.report))?;
    }

    if !output.new_items.is_empty() {
        let mut tables = Vec::with_capacity(2);
        if let Some(sheet) = input
            .rate_table
            .as_ref()
            .and_then(|wb| rate_sheet(wb, &config.rate_table).ok())
        {
            tables.push(sheet_table("Rates", sheet));
        }
        tables.push(new_items_table(&output.new_items));
        write(&tables, &out_dir.join(&names.new_items))?;
    }

    write(
        &[summary_table(&output.invoice_files)],
        &out_dir.join(&names.summary),
    )
}

fn print_summary(output: &RunOutput, out_dir: &Path) {
    let c = &output.counts;
    let s = &output.report.summary;
    eprintln!(
        "dutycheck: {} tariff entries, {} invoice item(s) from {} file(s), {} checklist item(s)",
        c.tariff_entries, c.invoice_items, c.invoice_files, c.checklist_items,
    );
    eprintln!(
        "compared {} id(s) at {}% price tolerance: {} differing, {} only in invoices",
        s.compared, output.meta.price_tolerance_pct, s.differing, s.only_in_truth,
    );
    if s.truth_duplicates + s.declared_duplicates > 0 {
        eprintln!(
            "duplicates dropped: {} invoice, {} checklist",
            s.truth_duplicates, s.declared_duplicates,
        );
    }
    if !output.new_items.is_empty() {
        eprintln!("new items: {}", output.new_items.len());
    }
    for issue in &output.issues {
        eprintln!("issue [{}]: {}", issue.stage, issue.message);
    }
    eprintln!("outputs in {}", out_dir.display());
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let label = if config.name.is_empty() { "(unnamed)" } else { config.name.as_str() };
    eprintln!(
        "valid: '{}' with {}% price tolerance, {} invoice input(s)",
        label,
        config.tolerance.price_pct,
        config.inputs.invoices.len(),
    );
    Ok(())
}

// ============================================================================
// resolve
// ============================================================================

pub fn cmd_resolve(
    config_path: Option<PathBuf>,
    rates: PathBuf,
    names: Vec<String>,
    json_output: bool,
) -> Result<(), CliError> {
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => ReconConfig::default(),
    };
    let workbook = read_workbook(&rates).map_err(|e| CliError::usage(e.to_string()))?;
    let table = load_tariffs(&workbook, &config.rate_table).map_err(|e| {
        CliError::new(EXIT_INVALID_CONFIG, e.to_string())
            .with_hint("check the [rate_table] header names against the workbook")
    })?;

    let mut rows = Vec::with_capacity(names.len());
    for name in &names {
        let normalized = normalize_item_name(name);
        let found = table.lookup(name.trim());
        if json_output {
            let matched = found.map(|m| {
                let (kind, score) = match m.kind {
                    MatchKind::Exact => ("exact", None),
                    MatchKind::Normalized => ("normalized", None),
                    MatchKind::Fuzzy { score } => ("fuzzy", Some(score)),
                };
                serde_json::json!({
                    "item_name": m.entry.item_name,
                    "kind": kind,
                    "score": score,
                    "hsn": m.entry.hsn,
                    "bcd": m.entry.bcd,
                    "sws": m.entry.sws,
                    "igst": m.entry.igst,
                })
            });
            rows.push(serde_json::json!({
                "name": name,
                "normalized": normalized,
                "match": matched,
            }));
            continue;
        }

        match found {
            Some(m) => {
                let kind = match m.kind {
                    MatchKind::Exact => "exact".to_string(),
                    MatchKind::Normalized => "normalized".to_string(),
                    MatchKind::Fuzzy { score } => format!("fuzzy {score:.2}"),
                };
                let rate = |r: Option<f64>| r.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{name}\t{normalized}\t{} ({kind})\tHSN {} BCD {} SWS {} IGST {}",
                    m.entry.item_name,
                    if m.entry.hsn.is_empty() { "-" } else { m.entry.hsn.as_str() },
                    rate(m.entry.bcd),
                    rate(m.entry.sws),
                    rate(m.entry.igst),
                );
            }
            None => println!("{name}\t{normalized}\tunmatched"),
        }
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&rows)
            .map_err(|e| CliError::write(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }
    Ok(())
}
