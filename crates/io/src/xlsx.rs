// Excel workbook import (xlsx, xls, xlsb, ods)
//
// Every sheet becomes its own raw table. A sheet that fails to read is
// skipped and reported; the other sheets of the file are still returned.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use salesrecon_core::text::normalize_header;
use salesrecon_core::{RawRow, RawTable, RowOrigin};

use crate::error::SourceError;
use crate::source::SkippedPart;

/// Sheets read from one workbook.
#[derive(Debug, Clone, Default)]
pub struct WorkbookRead {
    pub tables: Vec<RawTable>,
    pub skipped: Vec<SkippedPart>,
}

/// Read every sheet (or only those whose normalized name contains
/// `sheet_filter`) in workbook order.
pub fn read_workbook(path: &Path, sheet_filter: Option<&str>) -> Result<WorkbookRead, SourceError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| SourceError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let filter = sheet_filter.map(normalize_header).filter(|f| !f.is_empty());
    let source = path.display().to_string();
    let mut result = WorkbookRead::default();

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    for sheet_name in &sheet_names {
        if let Some(filter) = &filter {
            if !normalize_header(sheet_name).contains(filter.as_str()) {
                tracing::debug!(source = %source, sheet = %sheet_name, "sheet filtered out");
                continue;
            }
        }

        let range = match workbook.worksheet_range(sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(source = %source, sheet = %sheet_name, error = %e, "skipping unreadable sheet");
                result.skipped.push(SkippedPart {
                    name: sheet_name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        // Range start offset (data may not begin at A1)
        let (start_row, _) = range.start().unwrap_or((0, 0));
        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for (row_idx, row) in range.rows().enumerate() {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let line = start_row as usize + row_idx + 1;

            let Some(header) = headers.as_mut() else {
                headers = Some(cells.iter().map(|c| c.trim().to_string()).collect());
                continue;
            };
            while header.len() < cells.len() {
                header.push(format!("column_{}", header.len() + 1));
            }
            let fields = header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect();
            rows.push(RawRow::new(
                RowOrigin {
                    source: source.clone(),
                    sheet: Some(sheet_name.clone()),
                    line,
                },
                fields,
            ));
        }

        result.tables.push(RawTable {
            source: source.clone(),
            sheet: Some(sheet_name.clone()),
            headers: headers.unwrap_or_default(),
            rows,
        });
    }

    Ok(result)
}

/// Render one cell as the text a delimited export of it would contain.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Format nicely: integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => serial_to_iso(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Excel 1900-system serial → `YYYY-MM-DD`. Serials out of range are kept
/// as the bare number.
fn serial_to_iso(serial: f64) -> String {
    let days = serial.floor();
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)
        .filter(|_| days.is_finite() && (0.0..=2_958_465.0).contains(&days))
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)));
    match date {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => format!("{}", serial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    fn write_book(path: &Path) {
        let mut book = Workbook::new();
        let vendas = book.add_worksheet().set_name("Vendas Negócio").unwrap();
        vendas.write_string(0, 0, "SKU").unwrap();
        vendas.write_string(0, 1, "Unidades").unwrap();
        vendas.write_string(0, 2, "Total (BRL)").unwrap();
        vendas.write_string(1, 0, "ABC-1").unwrap();
        vendas.write_number(1, 1, 3.0).unwrap();
        vendas.write_number(1, 2, 59.7).unwrap();
        // blank row 2
        vendas.write_string(3, 0, "XYZ").unwrap();
        vendas.write_number(3, 1, 1.0).unwrap();
        vendas.write_number(3, 2, 10.0).unwrap();

        let resumo = book.add_worksheet().set_name("Resumo").unwrap();
        resumo.write_string(2, 1, "Periodo").unwrap();
        resumo.write_string(3, 1, "2024").unwrap();

        book.save(path).unwrap();
    }

    #[test]
    fn reads_every_sheet_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meli.xlsx");
        write_book(&path);

        let read = read_workbook(&path, None).unwrap();
        assert_eq!(read.tables.len(), 2);
        assert!(read.skipped.is_empty());

        let vendas = &read.tables[0];
        assert_eq!(vendas.sheet.as_deref(), Some("Vendas Negócio"));
        assert_eq!(vendas.headers, vec!["SKU", "Unidades", "Total (BRL)"]);
        assert_eq!(vendas.rows.len(), 2);
        assert_eq!(vendas.rows[0].value(1), "3");
        assert_eq!(vendas.rows[0].value(2), "59.7");
        assert_eq!(vendas.rows[1].origin.line, 4);

        let resumo = &read.tables[1];
        assert_eq!(resumo.headers, vec!["Periodo"]);
        assert_eq!(resumo.rows[0].value(0), "2024");
        assert_eq!(resumo.rows[0].origin.line, 4);
    }

    #[test]
    fn sheet_filter_is_accent_insensitive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meli.xlsx");
        write_book(&path);

        let read = read_workbook(&path, Some("negocio")).unwrap();
        assert_eq!(read.tables.len(), 1);
        assert_eq!(read.tables[0].sheet.as_deref(), Some("Vendas Negócio"));
    }

    #[test]
    fn not_a_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, "not a zip").unwrap();
        let err = read_workbook(&path, None).unwrap_err();
        assert_eq!(err.kind(), "workbook");
    }

    #[test]
    fn serial_dates() {
        assert_eq!(serial_to_iso(45366.0), "2024-03-15");
        assert_eq!(serial_to_iso(45366.75), "2024-03-15");
        assert_eq!(serial_to_iso(-5.0), "-5");
    }
}
