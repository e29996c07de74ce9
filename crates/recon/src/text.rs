//! Text normalization shared by both normalizers and the diff engine.

use crate::model::Cell;

/// Characters dropped from cleaned descriptions on top of the alphanumeric filter.
const STRAY_MARKS: [char; 3] = ['Φ', 'Ω', 'φ'];

/// Checklist descriptions carry a trailing part-number clause starting here.
const PART_NO_CLAUSE: &str = "-PART NO";

/// Tolerance tokens spelled out in checklist descriptions.
const CHECKLIST_NOISE: [&str; 2] = ["+OR-", "DEG"];

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Parse a number the way spreadsheets display it.
///
/// Accepts currency symbols (`$`, `₹`), thousands separators, surrounding
/// whitespace, a trailing `%`, and accounting negatives `(12.50)`. Anything
/// else that is not a plain signed decimal returns `None`.
pub fn parse_financial_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, inner) = match trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let digits: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | '₹' | ',') && !c.is_whitespace())
        .collect();
    if digits.is_empty() {
        return None;
    }

    let well_formed = digits.chars().enumerate().all(|(i, c)| match c {
        '0'..='9' | '.' => true,
        '-' | '+' => i == 0 && !negative,
        _ => false,
    });
    if !well_formed {
        return None;
    }

    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Item number as used in composite ids: `3.0` and `"3"` both give `"3"`.
pub fn canonical_item_number(cell: &Cell) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    match cell.as_number() {
        Some(n) => Some(format_number(n)),
        None => Some(cell.to_string().trim().to_string()),
    }
}

/// Integer part of a checklist item number: `4.0`, `4.7` and `"4"` give `"4"`.
pub fn integer_item_number(cell: &Cell) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    match cell.as_number() {
        Some(n) => Some(format_number(n.trunc())),
        None => Some(cell.to_string().trim().to_string()),
    }
}

/// True when the text before the first `.` reads as a number.
pub fn leads_with_number(cell: &Cell) -> bool {
    match cell {
        Cell::Number(n) => n.is_finite(),
        Cell::Text(s) => s
            .split('.')
            .next()
            .map(|head| head.trim().parse::<f64>().is_ok())
            .unwrap_or(false),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

/// Tariff lookup key: text before the first hyphen, trimmed.
pub fn item_name_from_description(description: &str) -> Option<String> {
    let head = description.split('-').next().unwrap_or(description).trim();
    (!head.is_empty()).then(|| head.to_string())
}

fn filter_description(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '(' | ')'))
        .flat_map(char::to_uppercase)
        .filter(|c| !STRAY_MARKS.contains(c))
        .collect()
}

/// Uppercased description keeping only letters, digits, `.`, `(` and `)`.
pub fn clean_invoice_description(description: &str) -> String {
    filter_description(description)
}

/// Checklist flavour: drops the trailing part-number clause and tolerance
/// tokens before the shared filter.
pub fn clean_checklist_description(description: &str) -> String {
    let head = description.split(PART_NO_CLAUSE).next().unwrap_or(description);
    let stripped = CHECKLIST_NOISE
        .iter()
        .fold(head.to_string(), |acc, token| acc.replace(token, ""));
    filter_description(&stripped)
}

// ---------------------------------------------------------------------------
// Codes and groups
// ---------------------------------------------------------------------------

/// Canonical HSN text. Each space-separated code loses a decimal tail of
/// zeros, so `"8501.0"` and `"8501"` compare equal.
pub fn canonical_hsn(hsn: &str) -> String {
    hsn.split_whitespace()
        .map(|code| {
            if code.contains('.') {
                code.trim_end_matches('0').trim_end_matches('.')
            } else {
                code
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Invoice group id from a sheet name: the first matching prefix is removed.
pub fn strip_group_prefix(sheet_name: &str, prefixes: &[String]) -> String {
    let name = sheet_name.trim();
    prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| name.strip_prefix(p.as_str()))
        .unwrap_or(name)
        .trim()
        .to_string()
}

/// Group id carried by a checklist boundary row: text between `marker` and
/// the first following `end` token, trimmed. `None` when the marker is
/// absent or nothing sits between the two.
pub fn extract_marker_group(text: &str, marker: &str, end: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let group = match rest.find(end) {
        Some(stop) if !end.is_empty() => &rest[..stop],
        _ => rest,
    };
    let group = group.trim();
    (!group.is_empty()).then(|| group.to_string())
}
