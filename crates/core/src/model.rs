use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// Calendar month a sale is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub const MIN_YEAR: i32 = 1900;
    pub const MAX_YEAR: i32 = 2100;

    /// Returns `None` unless `year` is in [1900, 2100] and `month` in [1, 12].
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) && (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// Where a raw row came from. Used in diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOrigin {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// 1-based line (delimited text, workbook row) or item number (invoice).
    pub line: usize,
}

impl fmt::Display for RowOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}[{}]:{}", self.source, sheet, self.line),
            None => write!(f, "{}:{}", self.source, self.line),
        }
    }
}

/// One untyped input line: source-native field name → text, in source order.
///
/// `period` is set by extractors that know the calendar month independently
/// of any column (an invoice's emission date).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub origin: RowOrigin,
    pub fields: Vec<(String, String)>,
    pub period: Option<YearMonth>,
}

impl RawRow {
    pub fn new(origin: RowOrigin, fields: Vec<(String, String)>) -> Self {
        Self { origin, fields, period: None }
    }

    /// Value at column `idx`, or `""` when the row is shorter than the header.
    pub fn value(&self, idx: usize) -> &str {
        self.fields.get(idx).map(|(_, v)| v.as_str()).unwrap_or("")
    }

    /// Value of the first field named exactly `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }
}

/// A header row plus the rows under it: one delimited file, one workbook
/// sheet, or the line items of one invoice document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub source: String,
    pub sheet: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Human label for diagnostics (`file.xlsx[Sheet1]`).
    pub fn label(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("{}[{}]", self.source, sheet),
            None => self.source.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical records + facts
// ---------------------------------------------------------------------------

/// One validated, normalized sale line.
///
/// Identity is `(sku, channel, period)`; `product_name` travels along but
/// is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalSalesRecord {
    pub sku: String,
    pub product_name: String,
    pub channel: Channel,
    pub period: Option<YearMonth>,
    pub units_sold: i64,
    pub gross_cents: i64,
}

impl CanonicalSalesRecord {
    pub fn unit_price_avg(&self) -> Option<f64> {
        unit_price(self.gross_cents, self.units_sold)
    }
}

/// One row of the output fact table. `units_sold` and `gross_cents` are
/// sums over every contributing record; `unit_price_avg` is derived from
/// the sums and is `None` when no units were sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedFact {
    pub sku: String,
    pub product_name: String,
    pub channel: Channel,
    pub period: Option<YearMonth>,
    pub units_sold: i64,
    pub gross_cents: i64,
    pub unit_price_avg: Option<f64>,
}

/// Average unit price in currency units. Undefined (not zero) without units.
pub fn unit_price(gross_cents: i64, units_sold: i64) -> Option<f64> {
    if units_sold > 0 {
        Some((gross_cents as f64 / 100.0) / units_sold as f64)
    } else {
        None
    }
}

/// Render integer cents with exactly two fractional digits (`-1234.5` → `"-1234.50"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_bounds() {
        assert!(YearMonth::new(2024, 3).is_some());
        assert!(YearMonth::new(1899, 12).is_none());
        assert!(YearMonth::new(2101, 1).is_none());
        assert!(YearMonth::new(2024, 0).is_none());
        assert!(YearMonth::new(2024, 13).is_none());
        assert_eq!(YearMonth::new(2024, 3).unwrap().to_string(), "2024-03");
    }

    #[test]
    fn unit_price_is_undefined_without_units() {
        assert_eq!(unit_price(1000, 0), None);
        assert_eq!(unit_price(0, 0), None);
        assert_eq!(unit_price(7999, 8), Some(79.99 / 8.0));
    }

    #[test]
    fn cents_formatting() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(123456), "1234.56");
        assert_eq!(format_cents(-150), "-1.50");
    }

    #[test]
    fn raw_row_lookup() {
        let row = RawRow::new(
            RowOrigin { source: "a.csv".into(), sheet: None, line: 2 },
            vec![("SKU".into(), "x1".into()), ("Qtd".into(), "3".into())],
        );
        assert_eq!(row.value(1), "3");
        assert_eq!(row.value(9), "");
        assert_eq!(row.get("SKU"), Some("x1"));
        assert_eq!(row.origin.to_string(), "a.csv:2");
    }
}
