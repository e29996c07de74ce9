// Excel import (calamine) and export (rust_xlsxwriter)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use tracing::{debug, warn};

use dutycheck_recon::export::Table;
use dutycheck_recon::model::{Cell, Sheet, Workbook};
use dutycheck_recon::text::format_number;

use crate::error::IoError;

/// Maximum dimensions read from a sheet
const MAX_ROWS: usize = 65536;
const MAX_COLS: usize = 256;

/// Import an Excel file (xlsx, xls, xlsb, ods) with every sheet in order.
pub fn import(path: &Path) -> Result<Workbook, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::open(path, e))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| IoError::Sheet {
                path: path.to_path_buf(),
                sheet: sheet_name.clone(),
                message: e.to_string(),
            })?;

        let (height, width) = range.get_size();
        if height > MAX_ROWS || width > MAX_COLS {
            warn!(
                sheet = %sheet_name,
                height, width, "sheet truncated to {MAX_ROWS}x{MAX_COLS}"
            );
        }

        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let (start_row, start_col) = (start_row as usize, start_col as usize);

        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row.min(MAX_ROWS)];
        for row in range.rows().take(MAX_ROWS.saturating_sub(start_row)) {
            let mut cells = vec![Cell::Empty; start_col.min(MAX_COLS)];
            cells.extend(
                row.iter()
                    .take(MAX_COLS.saturating_sub(start_col))
                    .map(convert),
            );
            while matches!(cells.last(), Some(Cell::Empty)) {
                cells.pop();
            }
            rows.push(cells);
        }
        debug!(sheet = %sheet_name, rows = rows.len(), "sheet imported");
        sheets.push(Sheet::new(sheet_name.clone(), rows));
    }

    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Workbook::new(name, sheets))
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        // Date serials stay numeric; nothing downstream reads dates.
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Write tables as sheets of one workbook.
///
/// A failed save is retried once after removing whatever sits at `path`,
/// which clears stale or locked outputs from an earlier run.
pub fn export(tables: &[Table], path: &Path) -> Result<(), IoError> {
    let mut workbook = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();

    for table in tables {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&table.name)
            .map_err(|e| IoError::write(path, format!("sheet '{}': {e}", table.name)))?;
        write_table(worksheet, table, &header_format).map_err(|e| IoError::write(path, e))?;
    }

    if let Err(first) = workbook.save(path) {
        if !path.exists() {
            return Err(IoError::write(path, first));
        }
        warn!(path = %path.display(), error = %first, "save failed, replacing existing file");
        std::fs::remove_file(path).map_err(|e| IoError::write(path, e))?;
        workbook.save(path).map_err(|e| IoError::write(path, e))?;
    }
    Ok(())
}

fn write_table(
    worksheet: &mut Worksheet,
    table: &Table,
    header_format: &Format,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    for (col, width) in table.column_widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    let mut row_offset = 0u32;
    if !table.headers.is_empty() {
        for (col, header) in table.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, header_format)?;
        }
        row_offset = 1;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + row_offset;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Number(n) if n.is_finite() => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Number(n) => {
                    worksheet.write_string(r, c, format_number(*n))?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
            }
        }
    }
    Ok(())
}
