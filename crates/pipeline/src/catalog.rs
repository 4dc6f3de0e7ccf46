use std::collections::HashMap;
use std::path::Path;

use salesrecon_core::normalize::{normalize_product_name, normalize_sku};
use salesrecon_core::{AliasTable, CanonicalField, CanonicalSalesRecord, RawTable};
use salesrecon_io::{read_source, ReadOptions, SourceError};

/// sku → product description, used to fill empty product names.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    names: HashMap<String, String>,
}

impl ProductCatalog {
    /// Load a delimited file or workbook with a sku column and a
    /// description column.
    pub fn load(path: &Path, options: &ReadOptions) -> Result<Self, SourceError> {
        let read = read_source(path, options)?;
        let catalog = Self::from_tables(&read.tables);
        tracing::info!(path = %path.display(), entries = catalog.len(), "product catalog loaded");
        Ok(catalog)
    }

    /// First non-empty description per sku wins. Tables without both
    /// columns are ignored.
    pub fn from_tables(tables: &[RawTable]) -> Self {
        let aliases = AliasTable::builtin();
        let mut names = HashMap::new();
        for table in tables {
            let mapping = aliases.map_headers(&table.headers);
            let (Some(sku_col), Some(name_col)) = (
                mapping.column(CanonicalField::Sku),
                mapping.column(CanonicalField::ProductName),
            ) else {
                tracing::warn!(table = %table.label(), "catalog table lacks sku/description columns");
                continue;
            };
            for row in &table.rows {
                let sku = normalize_sku(row.value(sku_col));
                let name = normalize_product_name(row.value(name_col));
                if !sku.is_empty() && !name.is_empty() {
                    names.entry(sku).or_insert(name);
                }
            }
        }
        Self { names }
    }

    pub fn lookup(&self, sku: &str) -> Option<&str> {
        self.names.get(sku).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Fill empty product names. A miss leaves the name empty. Returns the
    /// number of records filled.
    pub fn backfill(&self, records: &mut [CanonicalSalesRecord]) -> usize {
        let mut filled = 0;
        for record in records.iter_mut().filter(|r| r.product_name.is_empty()) {
            if let Some(name) = self.lookup(&record.sku) {
                record.product_name = name.to_string();
                filled += 1;
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesrecon_core::{Channel, RawRow, RowOrigin, YearMonth};

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            source: "produtos.csv".into(),
            sheet: None,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, values)| {
                    RawRow::new(
                        RowOrigin { source: "produtos.csv".into(), sheet: None, line: i + 2 },
                        headers
                            .iter()
                            .zip(values.iter())
                            .map(|(h, v)| (h.to_string(), v.to_string()))
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    fn record(sku: &str, name: &str) -> CanonicalSalesRecord {
        CanonicalSalesRecord {
            sku: sku.into(),
            product_name: name.into(),
            channel: Channel::Amazon,
            period: YearMonth::new(2024, 1),
            units_sold: 1,
            gross_cents: 100,
        }
    }

    #[test]
    fn backfills_only_empty_names() {
        let catalog = ProductCatalog::from_tables(&[table(
            &["sku", "descricao"],
            &[&["a1", "Shampoo 300ml"], &["B2.0", "Condicionador"], &["a1", "Outro nome"]],
        )]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup("A1"), Some("Shampoo 300ml"));
        assert_eq!(catalog.lookup("B2"), Some("Condicionador"));

        let mut records = vec![record("A1", ""), record("B2", "Já tem nome"), record("C3", "")];
        assert_eq!(catalog.backfill(&mut records), 1);
        assert_eq!(records[0].product_name, "Shampoo 300ml");
        assert_eq!(records[1].product_name, "Já tem nome");
        // a miss stays empty
        assert_eq!(records[2].product_name, "");
    }

    #[test]
    fn tables_without_columns_are_ignored() {
        let catalog = ProductCatalog::from_tables(&[table(&["foo", "bar"], &[&["1", "2"]])]);
        assert!(catalog.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("produtos.csv");
        std::fs::write(&path, "SKU;Descrição\nX1;Máscara\n").unwrap();
        let catalog = ProductCatalog::load(&path, &ReadOptions::default()).unwrap();
        assert_eq!(catalog.lookup("X1"), Some("Máscara"));
    }
}
