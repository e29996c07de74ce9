// CSV/TSV import and export

use std::path::Path;

use dutycheck_recon::export::Table;
use dutycheck_recon::model::{Cell, Sheet};

use crate::error::IoError;

/// Read a delimited file as a single sheet named after the file stem.
/// Every non-empty field becomes text; numeric reading happens downstream.
pub fn import(path: &Path) -> Result<Sheet, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => sniff_delimiter(&content),
    };
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Sheet1".to_string());
    import_from_string(&name, &content, delimiter).map_err(|e| IoError::open(path, e))
}

/// Pick the delimiter that yields the most consistent multi-field rows over
/// the first lines. Falls back to comma.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;
    for &delim in candidates {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else { continue };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

/// UTF-8, or Windows-1252 for legacy exports.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::open(path, e))?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(name: &str, content: &str, delimiter: u8) -> Result<Sheet, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::text(field)
                    }
                })
                .collect(),
        );
    }
    Ok(Sheet::new(name, rows))
}

/// Write one table. Header row first unless the table has none.
pub fn export(table: &Table, path: &Path) -> Result<(), IoError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| IoError::write(path, e))?;

    if !table.headers.is_empty() {
        writer
            .write_record(&table.headers)
            .map_err(|e| IoError::write(path, e))?;
    }
    for row in &table.rows {
        let record: Vec<String> = row.iter().map(Cell::to_string).collect();
        writer
            .write_record(&record)
            .map_err(|e| IoError::write(path, e))?;
    }
    writer.flush().map_err(|e| IoError::write(path, e))?;
    Ok(())
}
