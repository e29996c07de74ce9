// End-to-end tests driving the compiled `dutycheck` binary.
//
// Fixtures are real .xlsx files written through dutycheck-io into a
// temporary directory, so every run exercises the full read/write path.
//
// Run with: cargo test -p dutycheck-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use dutycheck_io::{read_workbook, write_tables};
use dutycheck_recon::export::Table;
use dutycheck_recon::Cell;
use tempfile::TempDir;

fn dutycheck() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dutycheck"))
}

fn run(args: &[&str]) -> Output {
    dutycheck().args(args).output().expect("spawn dutycheck")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn code(out: &Output) -> i32 {
    out.status.code().expect("exit code")
}

// ===========================================================================
// Fixtures
// ===========================================================================

fn t(s: &str) -> Cell {
    Cell::text(s)
}

fn n(v: f64) -> Cell {
    Cell::Number(v)
}

fn headerless(name: &str, rows: Vec<Vec<Cell>>) -> Table {
    Table { name: name.to_string(), rows, ..Table::default() }
}

fn write_rates(path: &Path) {
    let mut rates = Table::new(
        "Rates",
        &["Item Name", "HSN1", "HSN2", "Final BCD", "Final SWS", "Final IGST"],
    );
    rates.rows = vec![
        vec![t("Capacitor"), n(8532.0), Cell::Empty, n(10.0), n(10.0), n(18.0)],
        vec![t("Capacitor"), Cell::Empty, n(8533.0), n(7.5), n(10.0), n(18.0)],
        vec![t("Resistor"), n(8533.0), Cell::Empty, n(5.0), n(10.0), n(18.0)],
        vec![t("Connector Assembly"), n(8536.0), Cell::Empty, n(10.0), n(10.0), n(18.0)],
    ];
    write_tables(&[rates], path).unwrap();
}

fn invoice_row(item: f64, pn: &str, desc: &str, qty: f64, price: f64) -> Vec<Cell> {
    vec![n(item), Cell::Empty, t(pn), t(desc), t("pcs"), n(qty), n(price)]
}

/// With `gizmo`, the invoice carries an item missing from the rate table.
fn write_invoice(path: &Path, gizmo: bool) {
    let mut rows = vec![
        vec![t("No."), t("Img"), t("P/N"), t("Description"), t("Unit"), t("Qty"), t("Unit Price")],
        invoice_row(1.0, "C-100", "Capacitor - 10uF", 100.0, 0.25),
        invoice_row(2.0, "R-200", "Resistor - 1k", 500.0, 0.10),
    ];
    if gizmo {
        rows.push(invoice_row(3.0, "X-300", "Gizmo - blue", 2.0, 12.0));
    }
    rows.push(vec![]);
    rows.push(vec![t("Total"), Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, n(100.0)]);

    write_tables(
        &[
            headerless("Cover", vec![vec![t("Commercial invoices")]]),
            headerless("CI-2024001", rows),
        ],
        path,
    )
    .unwrap();
}

fn checklist_row(
    no: f64,
    pn: &str,
    desc: &str,
    qty: f64,
    price: f64,
    hsn: f64,
    bcd: f64,
) -> Vec<Cell> {
    vec![n(no), t(pn), t(desc), n(qty), n(price), n(hsn), n(bcd), n(10.0), n(18.0)]
}

/// `clean` declares exactly what the invoice and rate table say.
fn write_checklist(path: &Path, clean: bool) {
    let header: Vec<Cell> = [
        "Item#", "P/N", "Desc", "Qty", "Price", "HSN", "Duty", "Welfare", "IGST",
    ]
    .iter()
    .map(|h| t(h))
    .collect();
    let mut rows = vec![
        vec![t("BE Checklist")],
        vec![t("Importer: ACME")],
        vec![],
        header,
        vec![Cell::Empty, t("Invoice: 2024001 dt. 01.03.2024")],
        checklist_row(1.0, "C-100", "Capacitor-10uF-PART NO C-100", 100.0, 0.25, 8532.0, 7.5),
    ];
    if clean {
        rows.push(checklist_row(2.0, "R-200", "Resistor-1k", 500.0, 0.10, 8533.0, 5.0));
    } else {
        rows.push(checklist_row(2.0, "R-200", "Resistor-1k", 500.0, 0.11, 8533.0, 10.0));
        rows.push(checklist_row(3.0, "X-300", "Gizmo-blue", 2.0, 12.0, 8543.0, 10.0));
    }
    write_tables(&[headerless("Sheet1", rows)], path).unwrap();
}

struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    fn new(clean: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("in")).unwrap();
        write_rates(&dir.path().join("in/rates.xlsx"));
        write_invoice(&dir.path().join("in/march.xlsx"), !clean);
        write_checklist(&dir.path().join("in/checklist.xlsx"), clean);

        let config = dir.path().join("recon.toml");
        std::fs::write(
            &config,
            r#"
name = "march"

[inputs]
rate_table = "in/rates.xlsx"
checklist = "in/checklist.xlsx"
invoices = ["in/march.xlsx"]
"#,
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn config(&self) -> &str {
        self.config.to_str().unwrap()
    }
}

// ===========================================================================
// dutycheck run
// ===========================================================================

#[test]
fn run_with_discrepancies_exits_1_and_writes_outputs() {
    let fx = Fixture::new(false);
    let out = run(&["run", fx.config()]);
    assert_eq!(code(&out), 1, "stderr: {}", stderr(&out));

    for name in [
        "processed_invoices.xlsx",
        "processed_checklist.xlsx",
        "processed_report.xlsx",
        "added_new_items.xlsx",
        "processing_summary.xlsx",
    ] {
        assert!(fx.path("output").join(name).exists(), "missing {name}");
    }

    let report = read_workbook(&fx.path("output/processed_report.xlsx")).unwrap();
    let sheet = &report.sheets[0];
    assert_eq!(sheet.name, "Differences");
    assert_eq!(sheet.rows[1][0], t("2024001_2"));
    assert_eq!(sheet.rows[2][0], t("2024001_3"));

    let new_items = read_workbook(&fx.path("output/added_new_items.xlsx")).unwrap();
    let names: Vec<&str> = new_items.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Rates", "NewItems"]);
    assert_eq!(new_items.sheets[0].rows[0][0], t("Item Name"));
    assert_eq!(new_items.sheets[1].rows[1][1], t("Gizmo"));

    let summary = read_workbook(&fx.path("output/processing_summary.xlsx")).unwrap();
    let total = summary.sheets[0].rows.last().unwrap();
    assert_eq!(total[0], t("TOTAL"));
    assert_eq!(total[3], n(3.0));

    let err = stderr(&out);
    assert!(err.contains("2 differing"), "stderr: {err}");
    assert!(err.contains("item(s) need revision"), "stderr: {err}");
}

#[test]
fn clean_run_exits_0_and_skips_empty_outputs() {
    let fx = Fixture::new(true);
    let draft = fx.path("revise.txt");
    let out = run(&["run", fx.config(), "--draft", draft.to_str().unwrap()]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    assert!(fx.path("output/processed_invoices.xlsx").exists());
    assert!(fx.path("output/processing_summary.xlsx").exists());
    assert!(!fx.path("output/processed_report.xlsx").exists());
    assert!(!fx.path("output/added_new_items.xlsx").exists());
    assert!(!draft.exists());
}

#[test]
fn json_stdout_is_a_single_document() {
    let fx = Fixture::new(false);
    let out = run(&["run", fx.config(), "--json", "-q"]);
    assert_eq!(code(&out), 1);

    let stdout = String::from_utf8_lossy(&out.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be JSON: {e}\n{stdout}"));
    assert_eq!(val["meta"]["config_name"], "march");
    assert_eq!(val["report"]["rows"][0]["ID"], "2024001_2");
    assert_eq!(val["report"]["rows"][0]["BCD"], "10 -> 5");
    assert_eq!(val["new_items"][0]["item_name"], "Gizmo");
}

#[test]
fn draft_file_and_tolerance_override() {
    let fx = Fixture::new(false);
    let draft = fx.path("out/revise.txt");
    let json = fx.path("out/result.json");
    let out = run(&[
        "run",
        fx.config(),
        "--tolerance",
        "10",
        "--draft",
        draft.to_str().unwrap(),
        "--output",
        json.to_str().unwrap(),
    ]);
    assert_eq!(code(&out), 1, "stderr: {}", stderr(&out));

    let text = std::fs::read_to_string(&draft).unwrap();
    assert!(text.starts_with("Hello,"));
    assert!(text.contains("Invoice 2024001_2 use BCD is 5."), "draft: {text}");
    assert!(text.trim_end().ends_with("Thank you!"));

    let val: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(val["meta"]["price_tolerance_pct"], 10.0);
    assert!(val["report"]["rows"][0].get("Price").is_none());
}

#[test]
fn cli_inputs_override_config_and_out_dir() {
    let fx = Fixture::new(false);
    let out_dir = fx.path("elsewhere");
    let out = run(&[
        "run",
        "--rates",
        fx.path("in/rates.xlsx").to_str().unwrap(),
        "--checklist",
        fx.path("in/checklist.xlsx").to_str().unwrap(),
        "--invoice",
        fx.path("in/march.xlsx").to_str().unwrap(),
        "--out-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(code(&out), 1, "stderr: {}", stderr(&out));
    assert!(out_dir.join("processed_report.xlsx").exists());
}

#[test]
fn missing_rate_table_is_degraded() {
    let fx = Fixture::new(true);
    std::fs::remove_file(fx.path("in/rates.xlsx")).unwrap();
    let out = run(&["run", fx.config()]);
    assert_eq!(code(&out), 4, "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("issue [rate_table]"), "stderr: {err}");
    // Everything is unmatched, so every item is new.
    assert!(fx.path("output/added_new_items.xlsx").exists());
}

#[test]
fn no_inputs_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = dutycheck()
        .current_dir(dir.path())
        .args(["run"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).contains("hint:"));
}

#[test]
fn negative_tolerance_flag_is_usage_error() {
    let fx = Fixture::new(true);
    let out = run(&["run", fx.config(), "--tolerance=-1"]);
    assert_eq!(code(&out), 2, "stderr: {}", stderr(&out));
}

#[test]
fn version_reports_package_version() {
    let out = run(&["--version"]);
    assert_eq!(code(&out), 0);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("dutycheck {}", env!("CARGO_PKG_VERSION")));
}

// ===========================================================================
// dutycheck validate
// ===========================================================================

#[test]
fn validate_accepts_good_config() {
    let fx = Fixture::new(true);
    let out = run(&["validate", fx.config()]);
    assert_eq!(code(&out), 0);
    assert!(stderr(&out).contains("valid: 'march'"));
}

#[test]
fn validate_rejects_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[tolerance]\nprice_pct = -1.0\n").unwrap();
    let out = run(&["validate", path.to_str().unwrap()]);
    assert_eq!(code(&out), 3);
    assert!(stderr(&out).contains("price_pct"));
}

#[test]
fn validate_missing_file_is_usage_error() {
    let out = run(&["validate", "/nonexistent/recon.toml"]);
    assert_eq!(code(&out), 2);
}

// ===========================================================================
// dutycheck resolve
// ===========================================================================

#[test]
fn resolve_reports_match_kinds() {
    let fx = Fixture::new(true);
    let rates = fx.path("in/rates.xlsx");
    let out = run(&[
        "resolve",
        "--rates",
        rates.to_str().unwrap(),
        "Resistor",
        "Connector Assy",
        "Gizmo",
        "--json",
    ]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let val: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(val[0]["match"]["kind"], "exact");
    assert_eq!(val[0]["match"]["bcd"], 5.0);
    assert_eq!(val[1]["normalized"], "CONNECTORASSY");
    assert_eq!(val[1]["match"]["item_name"], "Connector Assembly");
    assert_eq!(val[1]["match"]["kind"], "fuzzy");
    assert!(val[2]["match"].is_null());
}

#[test]
fn resolve_text_output_marks_unmatched() {
    let fx = Fixture::new(true);
    let rates = fx.path("in/rates.xlsx");
    let out = run(&["resolve", "--rates", rates.to_str().unwrap(), "Gizmo"]);
    assert_eq!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stdout).contains("GIZMO\tunmatched"));
}
