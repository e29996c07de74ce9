//! Plain-text correction request built from a difference report.

use crate::model::{DifferenceReport, DifferenceRow, Field};

/// Fields in request order with the phrase that introduces each value.
const PHRASES: [(Field, &str); 8] = [
    (Field::Hsn, "HSN"),
    (Field::Bcd, "BCD is"),
    (Field::Sws, "SWS is"),
    (Field::Igst, "IGST is"),
    (Field::Quantity, "Qty is"),
    (Field::Price, "Price is"),
    (Field::Description, "Description is"),
    (Field::PartNumber, "P/N is"),
];

const GREETING: &str = "Hello,";
const REQUEST: &str = "Please revise the checklist as below:";
const CLOSING: &str = "Thank you!";

/// Request line for one report row, or `None` when no field carries a
/// usable truth value.
fn request_line(row: &DifferenceRow) -> Option<String> {
    let phrases: Vec<String> = PHRASES
        .iter()
        .filter_map(|(field, phrase)| {
            row.get(*field)
                .and_then(|c| c.requested_value())
                .map(|value| format!("{phrase} {value}"))
        })
        .collect();
    (!phrases.is_empty()).then(|| format!("Invoice {} use {}.", row.id, phrases.join(", ")))
}

/// Draft the correction request. `None` when there is nothing to ask for.
pub fn draft(report: &DifferenceReport) -> Option<String> {
    let requests: Vec<String> = report
        .rows
        .iter()
        .filter_map(request_line)
        .collect();
    if requests.is_empty() {
        return None;
    }

    let mut lines = vec![GREETING.to_string(), String::new(), REQUEST.to_string()];
    lines.extend(requests);
    lines.push(String::new());
    lines.push(CLOSING.to_string());
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{FieldChange, UNMATCHED_LABEL};

    fn change(declared: &str, truth: &str) -> FieldChange {
        FieldChange {
            declared: declared.into(),
            truth: truth.into(),
            truth_known: truth != UNMATCHED_LABEL,
        }
    }

    fn row(id: &str, changes: Vec<(Field, FieldChange)>) -> DifferenceRow {
        DifferenceRow {
            id: id.into(),
            changes: changes.into_iter().collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn empty_report_has_no_draft() {
        assert_eq!(draft(&DifferenceReport::default()), None);
    }

    #[test]
    fn phrases_follow_fixed_order() {
        let report = DifferenceReport {
            rows: vec![row(
                "2024001_3",
                vec![
                    (Field::Price, change("103", "100")),
                    (Field::Hsn, change("8532", "8533")),
                    (Field::Bcd, change("10", "7.5")),
                ],
            )],
            ..DifferenceReport::default()
        };
        let text = draft(&report).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Hello,");
        assert_eq!(lines[2], "Please revise the checklist as below:");
        assert_eq!(lines[3], "Invoice 2024001_3 use HSN 8533, BCD is 7.5, Price is 100.");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "Thank you!");
    }

    #[test]
    fn unmatched_and_empty_truth_values_skipped() {
        let report = DifferenceReport {
            rows: vec![
                row("A_1", vec![(Field::Hsn, change("8532", UNMATCHED_LABEL))]),
                row(
                    "A_2",
                    vec![
                        (Field::Hsn, change("8532", UNMATCHED_LABEL)),
                        (Field::Quantity, change("5", "4")),
                    ],
                ),
                row("A_3", vec![(Field::Description, change("X", ""))]),
            ],
            ..DifferenceReport::default()
        };
        let text = draft(&report).unwrap();
        assert!(!text.contains("A_1"));
        assert!(!text.contains("A_3"));
        assert!(text.contains("Invoice A_2 use Qty is 4."));
    }

    #[test]
    fn report_of_only_unmatched_rows_has_no_draft() {
        let report = DifferenceReport {
            rows: vec![row("A_1", vec![(Field::Bcd, change("10", UNMATCHED_LABEL))])],
            ..DifferenceReport::default()
        };
        assert_eq!(draft(&report), None);
    }
}
