//! Record Validator: one raw row in, one canonical record or a tagged
//! rejection out. Never fails the batch.

use std::fmt;

use salesrecon_core::normalize::{
    normalize_amount, normalize_count, normalize_date, normalize_product_name, normalize_sku,
};
use salesrecon_core::text::fold_ascii;
use salesrecon_core::{
    CanonicalField, CanonicalSalesRecord, Channel, ColumnMapping, Locale, RawRow, RowOrigin, YearMonth,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// A field carries a review marker. Counted apart from other rejections.
    Quarantined,
    UnknownChannel,
    EmptySku,
    /// Neither units nor value is positive.
    NoActivity,
    /// Units or value below zero while the other measure is positive.
    NegativeMeasure,
    UnresolvedPeriod,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarantined => "quarantined",
            Self::UnknownChannel => "unknown_channel",
            Self::EmptySku => "empty_sku",
            Self::NoActivity => "no_activity",
            Self::NegativeMeasure => "negative_measure",
            Self::UnresolvedPeriod => "unresolved_period",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub reason: RejectReason,
    pub origin: RowOrigin,
}

/// Case- and accent-insensitive review markers.
#[derive(Debug, Clone, Default)]
pub struct QuarantineMarkers(Vec<String>);

impl QuarantineMarkers {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        Self(
            markers
                .iter()
                .map(|m| fold(m.as_ref()))
                .filter(|m| !m.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, value: &str) -> bool {
        if self.0.is_empty() || value.is_empty() {
            return false;
        }
        let folded = fold(value);
        self.0.iter().any(|m| folded.contains(m.as_str()))
    }
}

fn fold(s: &str) -> String {
    fold_ascii(s.trim()).to_lowercase()
}

/// Everything about a row's table the validator needs.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub channel: Channel,
    pub mapping: &'a ColumnMapping,
    pub locale: Locale,
    /// Period taken from the source file name, when the channel allows it.
    pub file_period: Option<YearMonth>,
    pub markers: &'a QuarantineMarkers,
}

/// An accepted record plus how many of its numeric fields were unparsable
/// and replaced by zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub record: CanonicalSalesRecord,
    pub unparsable: usize,
}

/// Apply the rules in order: quarantine, channel, sku, activity, sign.
///
/// The period is resolved from the row (invoice emission date), the mapped
/// date column, then the file name; it may stay `None` for the caller's
/// imputation policy to settle.
pub fn validate(row: &RawRow, ctx: &RowContext<'_>) -> Result<Validated, Rejected> {
    let reject = |reason| Rejected { reason, origin: row.origin.clone() };

    if row.values().any(|v| ctx.markers.matches(v)) {
        return Err(reject(RejectReason::Quarantined));
    }
    if !ctx.channel.is_known() {
        return Err(reject(RejectReason::UnknownChannel));
    }

    let field = |f: CanonicalField| ctx.mapping.column(f).map(|i| row.value(i)).unwrap_or("");

    let sku = normalize_sku(field(CanonicalField::Sku));
    if sku.is_empty() {
        return Err(reject(RejectReason::EmptySku));
    }

    let mut unparsable = 0;
    let mut number = |parsed: Result<i64, _>| {
        parsed.unwrap_or_else(|_| {
            unparsable += 1;
            0
        })
    };
    let units_sold = number(normalize_count(field(CanonicalField::UnitsSold)));
    let gross_cents = number(normalize_amount(field(CanonicalField::GrossValue)));

    if units_sold <= 0 && gross_cents <= 0 {
        return Err(reject(RejectReason::NoActivity));
    }
    if units_sold < 0 || gross_cents < 0 {
        return Err(reject(RejectReason::NegativeMeasure));
    }

    let period = row
        .period
        .or_else(|| {
            ctx.mapping
                .column(CanonicalField::Date)
                .and_then(|i| normalize_date(row.value(i), ctx.locale))
        })
        .or(ctx.file_period);

    Ok(Validated {
        record: CanonicalSalesRecord {
            sku,
            product_name: normalize_product_name(field(CanonicalField::ProductName)),
            channel: ctx.channel,
            period,
            units_sold,
            gross_cents,
        },
        unparsable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesrecon_core::AliasTable;

    const HEADERS: [&str; 5] = ["SKU", "Produto", "Qtd", "Valor Total", "Data"];

    fn row(values: [&str; 5]) -> RawRow {
        RawRow::new(
            RowOrigin { source: "vendas.csv".into(), sheet: None, line: 2 },
            HEADERS
                .iter()
                .zip(values)
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn check(values: [&str; 5]) -> Result<Validated, Rejected> {
        let mapping = AliasTable::builtin().map_headers(&HEADERS);
        let markers = QuarantineMarkers::new(&["needs review", "revisar"]);
        let ctx = RowContext {
            channel: Channel::Shopee,
            mapping: &mapping,
            locale: Locale::PtBr,
            file_period: None,
            markers: &markers,
        };
        validate(&row(values), &ctx)
    }

    fn reason(values: [&str; 5]) -> RejectReason {
        check(values).unwrap_err().reason
    }

    #[test]
    fn accepts_and_normalizes() {
        let v = check([" abc-1.0 ", "Sérum  Facial - 12/03/2024", "3", "R$ 1.299,90", "15/03/2024"]).unwrap();
        assert_eq!(v.record.sku, "ABC-1");
        assert_eq!(v.record.product_name, "Sérum Facial");
        assert_eq!(v.record.units_sold, 3);
        assert_eq!(v.record.gross_cents, 129990);
        assert_eq!(v.record.period, YearMonth::new(2024, 3));
        assert_eq!(v.unparsable, 0);
    }

    #[test]
    fn quarantine_marker_anywhere_rejects() {
        assert_eq!(reason(["A1", "Kit NEEDS REVIEW", "3", "30", "2024-03-01"]), RejectReason::Quarantined);
        assert_eq!(reason(["A1", "Revisar", "3", "30", "2024-03-01"]), RejectReason::Quarantined);
        // checked before the sku rule
        assert_eq!(reason(["", "revisar", "0", "0", ""]), RejectReason::Quarantined);
    }

    #[test]
    fn empty_sku_rejected() {
        assert_eq!(reason(["", "Produto", "3", "30", ""]), RejectReason::EmptySku);
        assert_eq!(reason(["nan", "Produto", "3", "30", ""]), RejectReason::EmptySku);
        assert_eq!(reason(["  ''  ", "Produto", "3", "30", ""]), RejectReason::EmptySku);
    }

    #[test]
    fn no_activity_rejected() {
        assert_eq!(reason(["A1", "", "0", "0,00", ""]), RejectReason::NoActivity);
        assert_eq!(reason(["A1", "", "-1", "-5", ""]), RejectReason::NoActivity);
        // one positive measure is enough
        assert!(check(["A1", "", "0", "10", ""]).is_ok());
        assert!(check(["A1", "", "2", "0", ""]).is_ok());
    }

    #[test]
    fn negative_measure_rejected() {
        assert_eq!(reason(["A1", "", "-3", "30,00", "2024-03-01"]), RejectReason::NegativeMeasure);
        assert_eq!(reason(["A1", "", "2", "-50,00", "2024-03-01"]), RejectReason::NegativeMeasure);
        assert_eq!(reason(["A1", "", "0", "-0,01", ""]), RejectReason::NoActivity);
    }

    #[test]
    fn unparsable_values_become_zero_and_are_counted() {
        let v = check(["A1", "", "três", "49,99", ""]).unwrap();
        assert_eq!(v.record.units_sold, 0);
        assert_eq!(v.record.gross_cents, 4999);
        assert_eq!(v.unparsable, 1);
    }

    #[test]
    fn period_resolution_order() {
        let mapping = AliasTable::builtin().map_headers(&HEADERS);
        let markers = QuarantineMarkers::default();
        let mut ctx = RowContext {
            channel: Channel::Tiny,
            mapping: &mapping,
            locale: Locale::PtBr,
            file_period: YearMonth::new(2023, 1),
            markers: &markers,
        };

        let mut r = row(["A1", "", "1", "10", "2024-05-02"]);
        r.period = YearMonth::new(2022, 7);
        assert_eq!(validate(&r, &ctx).unwrap().record.period, YearMonth::new(2022, 7));

        r.period = None;
        assert_eq!(validate(&r, &ctx).unwrap().record.period, YearMonth::new(2024, 5));

        let r = row(["A1", "", "1", "10", "sem data"]);
        assert_eq!(validate(&r, &ctx).unwrap().record.period, YearMonth::new(2023, 1));

        ctx.file_period = None;
        assert_eq!(validate(&r, &ctx).unwrap().record.period, None);
    }

    #[test]
    fn unknown_channel_rejected() {
        let mapping = AliasTable::builtin().map_headers(&HEADERS);
        let markers = QuarantineMarkers::default();
        let ctx = RowContext {
            channel: Channel::Unknown,
            mapping: &mapping,
            locale: Locale::PtBr,
            file_period: None,
            markers: &markers,
        };
        let err = validate(&row(["A1", "", "1", "10", ""]), &ctx).unwrap_err();
        assert_eq!(err.reason, RejectReason::UnknownChannel);
        assert_eq!(err.origin.line, 2);
    }
}
