//! Workbook I/O for dutycheck.
//!
//! Reads spreadsheets into [`dutycheck_recon::Workbook`] and writes
//! [`dutycheck_recon::export::Table`]s out as Excel or CSV, chosen by file
//! extension.

pub mod csv;
pub mod error;
pub mod xlsx;

use std::path::{Path, PathBuf};

use dutycheck_recon::export::Table;
use dutycheck_recon::Workbook;
use tracing::{debug, warn};

pub use error::IoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Excel,
    Csv,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Excel),
            "csv" | "tsv" => Some(Self::Csv),
            _ => None,
        }
    }
}

fn format_of(path: &Path) -> Result<FileFormat, IoError> {
    FileFormat::from_path(path).ok_or_else(|| IoError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

/// Load every sheet of a workbook. CSV/TSV files load as a one-sheet workbook.
pub fn read_workbook(path: &Path) -> Result<Workbook, IoError> {
    let workbook = match format_of(path)? {
        FileFormat::Excel => xlsx::import(path)?,
        FileFormat::Csv => {
            let sheet = csv::import(path)?;
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Workbook::new(name, vec![sheet])
        }
    };
    debug!(path = %path.display(), sheets = workbook.sheets.len(), "workbook loaded");
    Ok(workbook)
}

/// Write tables to `path`. Excel gets one sheet per table. CSV gets the
/// first table at `path` and each further table beside it as
/// `<stem>_<table>.csv`.
pub fn write_tables(tables: &[Table], path: &Path) -> Result<Vec<PathBuf>, IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IoError::write(path, e))?;
    }

    match format_of(path)? {
        FileFormat::Excel => {
            xlsx::export(tables, path)?;
            Ok(vec![path.to_path_buf()])
        }
        FileFormat::Csv => {
            let mut written = Vec::with_capacity(tables.len());
            for (i, table) in tables.iter().enumerate() {
                let target = if i == 0 {
                    path.to_path_buf()
                } else {
                    sibling_csv(path, &table.name)
                };
                csv::export(table, &target)?;
                written.push(target);
            }
            if written.len() > 1 {
                warn!(
                    path = %path.display(),
                    files = written.len(),
                    "CSV output split across files"
                );
            }
            Ok(written)
        }
    }
}

fn sibling_csv(path: &Path, table: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}_{table}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dutycheck_recon::Cell;
    use tempfile::tempdir;

    #[test]
    fn format_by_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.XLSX")), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_path(Path::new("a.tsv")), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(FileFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = read_workbook(Path::new("rates.pdf")).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFormat { .. }));
    }

    #[test]
    fn csv_output_splits_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/new_items.csv");
        let mut a = Table::new("Rates", &["Item Name"]);
        a.rows.push(vec![Cell::text("Relay")]);
        let b = Table::new("NewItems", &["Item Name"]);

        let written = write_tables(&[a, b], &path).unwrap();
        assert_eq!(written, vec![path.clone(), dir.path().join("nested/new_items_NewItems.csv")]);

        let wb = read_workbook(&path).unwrap();
        assert_eq!(wb.name, "new_items.csv");
        assert_eq!(wb.sheets[0].rows[1][0], Cell::text("Relay"));
    }

    #[test]
    fn xlsx_round_trip_through_dispatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/report.xlsx");
        let mut t = Table::new("Summary", &["Invoice File", "Items Processed"]);
        t.rows.push(vec![Cell::text("TOTAL"), Cell::Number(4.0)]);
        write_tables(&[t], &path).unwrap();

        let wb = read_workbook(&path).unwrap();
        assert_eq!(wb.sheets[0].rows[1], vec![Cell::text("TOTAL"), Cell::Number(4.0)]);
    }
}
