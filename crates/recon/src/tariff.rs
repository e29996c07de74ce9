//! Rate table aggregation and item-name resolution.
//!
//! Lookup runs three tiers in order: exact name, normalized name, then a
//! similarity scan over every normalized key. The scan accepts the best
//! candidate scoring at least [`MATCH_THRESHOLD`]; ties keep the entry that
//! appeared first in the rate table.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::{ColumnSpec, RateTableLayout, SheetContext};
use crate::error::ReconError;
use crate::model::{cell_at, row_is_blank, Cell, NewItem, Sheet, Tariff, TariffEntry};

/// Minimum similarity for a fuzzy match.
pub const MATCH_THRESHOLD: f64 = 0.70;

/// Shortest common prefix that counts as partial evidence of a match.
pub const MIN_COMMON_PREFIX: usize = 8;

/// Stripped from the end of normalized names, repeatedly.
const NAME_SUFFIXES: [&str; 5] = ["PARTNO", "PART", "NO", "NUM", "NUMBER"];

// ---------------------------------------------------------------------------
// Name normalization + similarity
// ---------------------------------------------------------------------------

/// Uppercase, drop whitespace, `-` and `_`, map `,`/`;` to `.`, then strip
/// part-number suffixes until none remain. Idempotent.
pub fn normalize_item_name(name: &str) -> String {
    let mut key: String = name
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_'))
        .map(|c| if matches!(c, ',' | ';') { '.' } else { c })
        .flat_map(char::to_uppercase)
        .collect();
    while let Some(suffix) = NAME_SUFFIXES.iter().find(|s| key.ends_with(*s)) {
        key.truncate(key.len() - suffix.len());
    }
    key
}

/// Similarity of two normalized names in `[0, 1]`.
///
/// Containment scores `len(shorter) / len(longer)`. Otherwise a common prefix
/// of at least [`MIN_COMMON_PREFIX`] characters scores `prefix / len(longer)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    let longest = len_a.max(len_b);
    if longest == 0 {
        return 0.0;
    }
    if a.contains(b) || b.contains(a) {
        return len_a.min(len_b) as f64 / longest as f64;
    }
    let prefix = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    if prefix >= MIN_COMMON_PREFIX {
        prefix as f64 / longest as f64
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// One raw rate-table row, before aggregation by item name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateRow {
    pub item_name: String,
    pub hsn_primary: Cell,
    pub hsn_secondary: Cell,
    pub bcd: Cell,
    pub sws: Cell,
    pub igst: Cell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    Normalized,
    Fuzzy { score: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TariffMatch<'t> {
    pub entry: &'t TariffEntry,
    pub kind: MatchKind,
}

#[derive(Default)]
struct Accumulator {
    hsn_primary: Vec<String>,
    hsn_secondary: Vec<String>,
    bcd: Option<f64>,
    sws: Option<f64>,
    igst: Option<f64>,
}

fn min_rate(acc: &mut Option<f64>, cell: &Cell, item: &str, column: &str) {
    if cell.is_blank() {
        return;
    }
    match cell.as_number() {
        Some(v) => *acc = Some(acc.map_or(v, |cur| cur.min(v))),
        None => warn!(item, column, value = %cell, "non-numeric rate ignored"),
    }
}

/// Aggregated rate table keyed by item name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TariffTable {
    entries: Vec<TariffEntry>,
    normalized: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl TariffTable {
    /// Group rows by item name: HSN codes space-joined, each rate the minimum
    /// numeric value, the primary code preferred when any row carries one.
    pub fn from_rows(rows: impl IntoIterator<Item = RateRow>) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Accumulator> = HashMap::new();

        for row in rows {
            if row.item_name.trim().is_empty() {
                continue;
            }
            let acc = groups.entry(row.item_name.clone()).or_insert_with(|| {
                order.push(row.item_name.clone());
                Accumulator::default()
            });
            for (cell, codes) in [
                (&row.hsn_primary, &mut acc.hsn_primary),
                (&row.hsn_secondary, &mut acc.hsn_secondary),
            ] {
                if !cell.is_blank() {
                    codes.push(cell.to_string().trim().to_string());
                }
            }
            min_rate(&mut acc.bcd, &row.bcd, &row.item_name, "BCD");
            min_rate(&mut acc.sws, &row.sws, &row.item_name, "SWS");
            min_rate(&mut acc.igst, &row.igst, &row.item_name, "IGST");
        }

        let mut table = Self::default();
        for name in order {
            let Some(acc) = groups.remove(&name) else { continue };
            let hsn = if acc.hsn_primary.is_empty() {
                acc.hsn_secondary.join(" ")
            } else {
                acc.hsn_primary.join(" ")
            };
            table.by_name.insert(name.clone(), table.entries.len());
            table.normalized.push(normalize_item_name(&name));
            table.entries.push(TariffEntry {
                item_name: name,
                hsn,
                bcd: acc.bcd,
                sws: acc.sws,
                igst: acc.igst,
            });
        }
        table
    }

    /// Read a rate sheet whose first row holds the headers named in `layout`.
    /// The secondary HSN column may be absent.
    pub fn from_sheet(sheet: &Sheet, layout: &RateTableLayout) -> Result<Self, ReconError> {
        let Some((header_row, body)) = sheet.rows.split_first() else {
            return Err(ReconError::EmptyInput {
                source_name: format!("rate table '{}'", sheet.name),
            });
        };
        let ctx = SheetContext {
            source: "rate table",
            sheet: &sheet.name,
            width: sheet.width(),
        };
        let col = |name: &str| {
            ColumnSpec::Header(name.to_string()).resolve(header_row, ctx, name)
        };
        let item = col(&layout.item_name)?;
        let hsn1 = col(&layout.hsn_primary)?;
        let hsn2 = ColumnSpec::Header(layout.hsn_secondary.clone()).resolve_optional(
            header_row,
            ctx,
            &layout.hsn_secondary,
        )?;
        let bcd = col(&layout.bcd)?;
        let sws = col(&layout.sws)?;
        let igst = col(&layout.igst)?;

        let rows = body
            .iter()
            .filter(|row| !row_is_blank(row) && !cell_at(row, item).is_blank())
            .map(|row| RateRow {
                item_name: cell_at(row, item).to_string(),
                hsn_primary: cell_at(row, hsn1).clone(),
                hsn_secondary: hsn2.map(|c| cell_at(row, c).clone()).unwrap_or_default(),
                bcd: cell_at(row, bcd).clone(),
                sws: cell_at(row, sws).clone(),
                igst: cell_at(row, igst).clone(),
            });
        let table = Self::from_rows(rows);
        debug!(sheet = %sheet.name, entries = table.len(), "rate table loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TariffEntry] {
        &self.entries
    }

    pub fn get(&self, item_name: &str) -> Option<&TariffEntry> {
        self.by_name.get(item_name).map(|&i| &self.entries[i])
    }

    /// Resolve an item name to a rate entry.
    pub fn lookup(&self, item_name: &str) -> Option<TariffMatch<'_>> {
        if item_name.trim().is_empty() {
            return None;
        }
        if let Some(&i) = self.by_name.get(item_name) {
            return Some(TariffMatch { entry: &self.entries[i], kind: MatchKind::Exact });
        }

        let key = normalize_item_name(item_name);
        if key.is_empty() {
            return None;
        }
        if let Some(i) = self.normalized.iter().position(|k| *k == key) {
            return Some(TariffMatch { entry: &self.entries[i], kind: MatchKind::Normalized });
        }

        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in self.normalized.iter().enumerate() {
            let score = similarity(&key, candidate);
            if score >= MATCH_THRESHOLD && best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best.map(|(i, score)| TariffMatch {
            entry: &self.entries[i],
            kind: MatchKind::Fuzzy { score },
        })
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves item names for one pipeline and records the names that failed,
/// once each, with the id of their first occurrence.
#[derive(Debug)]
pub struct TariffResolver<'t> {
    table: &'t TariffTable,
    seen: HashSet<String>,
    unresolved: Vec<NewItem>,
}

impl<'t> TariffResolver<'t> {
    pub fn new(table: &'t TariffTable) -> Self {
        Self {
            table,
            seen: HashSet::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn table(&self) -> &'t TariffTable {
        self.table
    }

    pub fn resolve(&mut self, item_name: &str, occurrence_id: Option<&str>) -> Tariff {
        if item_name.trim().is_empty() {
            return Tariff::Blank;
        }
        match self.table.lookup(item_name) {
            Some(m) => {
                if let MatchKind::Fuzzy { score } = m.kind {
                    debug!(
                        item = item_name,
                        matched = %m.entry.item_name,
                        score,
                        "fuzzy tariff match"
                    );
                }
                Tariff::Matched(m.entry.clone())
            }
            None => {
                if self.seen.insert(item_name.to_string()) {
                    debug!(item = item_name, id = occurrence_id, "no tariff entry");
                    self.unresolved.push(NewItem {
                        item_name: item_name.to_string(),
                        first_seen_id: occurrence_id.map(str::to_string),
                    });
                }
                Tariff::Unmatched
            }
        }
    }

    pub fn unresolved(&self) -> &[NewItem] {
        &self.unresolved
    }

    pub fn into_unresolved(self) -> Vec<NewItem> {
        self.unresolved
    }
}
