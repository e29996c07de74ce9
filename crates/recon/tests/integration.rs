use dutycheck_recon::config::ReconConfig;
use dutycheck_recon::engine::{run, RunInput};
use dutycheck_recon::model::{Cell, Field, Sheet, Stage, StageIssue, Workbook};

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

fn t(s: &str) -> Cell {
    Cell::text(s)
}

fn n(v: f64) -> Cell {
    Cell::Number(v)
}

fn rates() -> Workbook {
    Workbook::new(
        "rates.xlsx",
        vec![Sheet::new(
            "Sheet1",
            vec![
                vec![
                    t("Item Name"),
                    t("HSN1"),
                    t("HSN2"),
                    t("Final BCD"),
                    t("Final SWS"),
                    t("Final IGST"),
                ],
                vec![t("Capacitor"), n(8532.0), Cell::Empty, n(10.0), n(10.0), n(18.0)],
                vec![t("Capacitor"), Cell::Empty, n(8533.0), n(7.5), n(10.0), n(18.0)],
                vec![t("Resistor"), n(8533.0), Cell::Empty, n(5.0), n(10.0), n(18.0)],
                vec![t("Connector Assembly"), n(8536.0), Cell::Empty, n(10.0), n(10.0), n(18.0)],
            ],
        )],
    )
}

fn invoice_row(item: f64, pn: &str, desc: &str, qty: f64, price: f64) -> Vec<Cell> {
    vec![n(item), Cell::Empty, t(pn), t(desc), t("pcs"), n(qty), n(price)]
}

fn invoice_header() -> Vec<Cell> {
    vec![t("No."), t("Img"), t("P/N"), t("Description"), t("Unit"), t("Qty"), t("Unit Price")]
}

fn invoices() -> Workbook {
    Workbook::new(
        "march.xlsx",
        vec![
            Sheet::new("Cover", vec![vec![t("Commercial invoices")]]),
            Sheet::new(
                "CI-2024001",
                vec![
                    invoice_header(),
                    invoice_row(1.0, "C-100", "Capacitor - 10uF", 100.0, 0.25),
                    invoice_row(2.0, "R-200", "Resistor - 1k", 500.0, 0.10),
                    invoice_row(3.0, "X-300", "Gizmo - blue", 2.0, 12.0),
                    vec![],
                    vec![t("Total"), Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, n(602.0)],
                ],
            ),
            Sheet::new(
                "CI-2024002",
                vec![
                    invoice_header(),
                    invoice_row(1.0, "J-1", "Connector Assy - 4 pin", 10.0, 1.5),
                ],
            ),
        ],
    )
}

fn checklist_row(
    no: f64,
    pn: &str,
    desc: &str,
    qty: f64,
    price: f64,
    hsn: Cell,
    bcd: f64,
) -> Vec<Cell> {
    vec![n(no), t(pn), t(desc), n(qty), n(price), hsn, n(bcd), n(10.0), n(18.0)]
}

fn checklist() -> Workbook {
    Workbook::new(
        "checklist.xlsx",
        vec![Sheet::new(
            "Sheet1",
            vec![
                vec![t("BE Checklist")],
                vec![t("Importer: ACME")],
                vec![],
                ["Item#", "P/N", "Desc", "Qty", "Price", "HSN", "Duty", "Welfare", "IGST"]
                    .iter()
                    .map(|h| t(h))
                    .collect(),
                vec![Cell::Empty, t("Invoice: 2024001 dt. 01.03.2024")],
                checklist_row(
                    1.0,
                    "C-100",
                    "Capacitor-10uF-PART NO C-100",
                    100.0,
                    0.25,
                    t("8532.0"),
                    7.5,
                ),
                checklist_row(2.0, "R-200", "Resistor-1k", 500.0, 0.11, n(8533.0), 10.0),
                checklist_row(3.0, "X-300", "Gizmo-blue", 2.0, 12.0, n(8543.0), 10.0),
                vec![Cell::Empty, t("Invoice: 2024002 dt. 02.03.2024")],
                checklist_row(1.0, "J-1", "Connector Assy-4 pin", 10.0, 1.5, n(8536.0), 10.0),
            ],
        )],
    )
}

fn input() -> RunInput {
    RunInput {
        rate_table: Some(rates()),
        invoices: vec![invoices()],
        checklist: Some(checklist()),
        issues: Vec::new(),
    }
}

// -------------------------------------------------------------------------
// End-to-end
// -------------------------------------------------------------------------

#[test]
fn full_run_reports_only_real_discrepancies() {
    let config = ReconConfig::from_toml("name = \"march\"").unwrap();
    let out = run(&config, &input());

    assert!(!out.is_degraded(), "issues: {:?}", out.issues);
    assert_eq!(out.meta.config_name, "march");
    assert_eq!(out.counts.tariff_entries, 3);
    assert_eq!(out.counts.invoice_items, 4);
    assert_eq!(out.counts.checklist_items, 4);

    let ids: Vec<&str> = out.report.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["2024001_2", "2024001_3"]);

    // Resistor: 10% price gap and a wrong BCD.
    let resistor = &out.report.rows[0];
    assert_eq!(resistor.get(Field::Price).unwrap().to_string(), "0.11 -> 0.1");
    assert_eq!(resistor.get(Field::Bcd).unwrap().to_string(), "10 -> 5");
    assert!(resistor.get(Field::Hsn).is_none());

    // Gizmo has no rate entry.
    let gizmo = &out.report.rows[1];
    assert_eq!(gizmo.get(Field::Hsn).unwrap().to_string(), "8543 -> UNMATCHED");
    assert!(!gizmo.get(Field::Hsn).unwrap().truth_known);

    assert_eq!(out.new_items.len(), 1);
    assert_eq!(out.new_items[0].item_name, "Gizmo");
    assert_eq!(out.new_items[0].first_seen_id.as_deref(), Some("2024001_3"));
    assert_eq!(out.checklist_new_items.len(), 1);

    let draft = out.draft.as_deref().unwrap();
    assert!(draft.contains("Invoice 2024001_2 use BCD is 5, Price is 0.1."));
    assert!(!draft.contains("2024001_3"));
}

#[test]
fn trailer_rows_never_reach_the_report() {
    let config = ReconConfig::default();
    let out = run(&config, &input());
    assert!(out
        .invoices
        .items
        .iter()
        .all(|i| i.composite_id.as_deref() != Some("2024001_Total")));
    assert_eq!(out.invoice_files[0].items, 4);
    assert_eq!(out.invoice_files[0].sheets_processed, 2);
}

#[test]
fn wider_tolerance_absorbs_price_gap() {
    let config = ReconConfig::from_toml("[tolerance]\nprice_pct = 10.0").unwrap();
    let out = run(&config, &input());
    let resistor = &out.report.rows[0];
    assert!(resistor.get(Field::Price).is_none());
    assert!(resistor.get(Field::Bcd).is_some());
}

#[test]
fn missing_rate_table_degrades_to_unmatched() {
    let mut input = input();
    input.rate_table = None;
    input.issues.push(StageIssue::new(Stage::RateTable, "rates.xlsx: not found"));
    let out = run(&ReconConfig::default(), &input);

    assert!(out.is_degraded());
    assert_eq!(out.counts.tariff_entries, 0);
    assert_eq!(out.report.rows.len(), 4);
    assert_eq!(out.new_items.len(), 4);
    assert!(out.draft.is_some());
}

#[test]
fn checklist_schema_mismatch_is_a_stage_issue() {
    let config = ReconConfig::from_toml("[checklist.columns]\nitem_number = \"Line\"").unwrap();
    let out = run(&config, &input());

    assert_eq!(out.issues.len(), 1);
    assert_eq!(out.issues[0].stage, Stage::Checklist);
    assert!(out.issues[0].message.contains("item_number"));
    assert!(out.report.is_empty());
    assert_eq!(out.report.summary.only_in_truth, 4);
    assert_eq!(out.counts.invoice_items, 4);
}

#[test]
fn json_document_shape() {
    let out = run(&ReconConfig::default(), &input());
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["meta"]["engine_version"].is_string());
    assert_eq!(
        json["report"]["columns"],
        serde_json::json!(["HSN", "BCD", "SWS", "IGST", "Price"])
    );
    assert_eq!(json["report"]["rows"][0]["ID"], "2024001_2");
    assert_eq!(json["report"]["rows"][0]["Price"], "0.11 -> 0.1");
    assert_eq!(json["new_items"][0]["item_name"], "Gizmo");
    assert!(json.get("invoices").is_none());
}
