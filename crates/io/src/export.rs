// Fact-table export (delimited text, xlsx)

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use salesrecon_core::{format_cents, AggregatedFact};

use crate::error::SourceError;

/// Output column names, in order.
pub const FACT_COLUMNS: [&str; 8] = [
    "sku",
    "produto",
    "ano",
    "mes",
    "canal",
    "vendas",
    "valor_total",
    "valor_unitario_medio",
];

/// Write facts as comma-separated text with a header row.
pub fn write_facts_csv(path: &Path, facts: &[AggregatedFact]) -> Result<(), SourceError> {
    let file = std::fs::File::create(path).map_err(|e| write_err(path, e))?;
    write_facts(file, facts).map_err(|e| write_err(path, e))
}

/// Write facts to any writer. Currency has two decimals, counts are plain
/// integers, an undefined average is an empty cell.
pub fn write_facts<W: std::io::Write>(writer: W, facts: &[AggregatedFact]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_writer(writer);
    writer.write_record(FACT_COLUMNS)?;
    for fact in facts {
        let (year, month) = match fact.period {
            Some(p) => (p.year.to_string(), p.month.to_string()),
            None => (String::new(), String::new()),
        };
        writer.write_record([
            fact.sku.clone(),
            fact.product_name.clone(),
            year,
            month,
            fact.channel.to_string(),
            fact.units_sold.to_string(),
            format_cents(fact.gross_cents),
            fact.unit_price_avg.map(|v| format!("{:.2}", v)).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write facts to a single-sheet workbook named `base`.
pub fn write_facts_xlsx(path: &Path, facts: &[AggregatedFact]) -> Result<(), SourceError> {
    let mut workbook = Workbook::new();
    let money = Format::new().set_num_format("0.00");
    let header = Format::new().set_bold();

    let worksheet = workbook
        .add_worksheet()
        .set_name("base")
        .map_err(|e| write_err(path, e))?;

    for (col, name) in FACT_COLUMNS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *name, &header)
            .map_err(|e| write_err(path, e))?;
    }

    for (idx, fact) in facts.iter().enumerate() {
        let row = idx as u32 + 1;
        let result = (|| {
            worksheet.write_string(row, 0, &fact.sku)?;
            worksheet.write_string(row, 1, &fact.product_name)?;
            if let Some(p) = fact.period {
                worksheet.write_number(row, 2, p.year as f64)?;
                worksheet.write_number(row, 3, p.month as f64)?;
            }
            worksheet.write_string(row, 4, fact.channel.as_str())?;
            worksheet.write_number(row, 5, fact.units_sold as f64)?;
            worksheet.write_number_with_format(row, 6, fact.gross_cents as f64 / 100.0, &money)?;
            if let Some(avg) = fact.unit_price_avg {
                worksheet.write_number_with_format(row, 7, avg, &money)?;
            }
            Ok::<(), rust_xlsxwriter::XlsxError>(())
        })();
        result.map_err(|e| write_err(path, e))?;
    }

    worksheet.set_freeze_panes(1, 0).map_err(|e| write_err(path, e))?;
    workbook.save(path).map_err(|e| write_err(path, e))
}

fn write_err(path: &Path, e: impl std::fmt::Display) -> SourceError {
    SourceError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesrecon_core::{Channel, YearMonth};
    use tempfile::tempdir;

    fn fact(sku: &str, units: i64, cents: i64) -> AggregatedFact {
        AggregatedFact {
            sku: sku.into(),
            product_name: format!("Produto {sku}"),
            channel: Channel::Shopee,
            period: YearMonth::new(2024, 3),
            units_sold: units,
            gross_cents: cents,
            unit_price_avg: salesrecon_core::model::unit_price(cents, units),
        }
    }

    #[test]
    fn csv_layout() {
        let mut out = Vec::new();
        write_facts(&mut out, &[fact("X1", 8, 7999), fact("Z0", 0, 1500)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sku,produto,ano,mes,canal,vendas,valor_total,valor_unitario_medio");
        assert_eq!(lines[1], "X1,Produto X1,2024,3,shopee,8,79.99,10.00");
        assert_eq!(lines[2], "Z0,Produto Z0,2024,3,shopee,0,15.00,");
    }

    #[test]
    fn xlsx_sink_reads_back() {
        use calamine::{open_workbook_auto, Data, Reader};

        let dir = tempdir().unwrap();
        let path = dir.path().join("base.xlsx");
        write_facts_xlsx(&path, &[fact("X1", 8, 7999)]).unwrap();

        let mut book = open_workbook_auto(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["base".to_string()]);
        let range = book.worksheet_range("base").unwrap();
        assert_eq!(range.get((0, 6)), Some(&Data::String("valor_total".into())));
        assert_eq!(range.get((1, 0)), Some(&Data::String("X1".into())));
        assert_eq!(range.get((1, 6)), Some(&Data::Float(79.99)));
    }
}
