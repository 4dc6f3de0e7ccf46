use std::collections::BTreeMap;

use salesrecon_core::model::unit_price;
use salesrecon_core::{AggregatedFact, CanonicalSalesRecord, Channel, YearMonth};

/// Grouping key. Field order is the output order of the fact table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey {
    pub channel: Channel,
    pub period: Option<YearMonth>,
    pub sku: String,
}

/// Anything that can be folded into a fact: a single record, or a fact
/// produced by an earlier aggregation. Re-aggregating facts therefore gives
/// back the same facts.
pub trait Contribution {
    fn key(&self) -> FactKey;
    fn product_name(&self) -> &str;
    fn units_sold(&self) -> i64;
    fn gross_cents(&self) -> i64;
}

impl Contribution for CanonicalSalesRecord {
    fn key(&self) -> FactKey {
        FactKey { channel: self.channel, period: self.period, sku: self.sku.clone() }
    }
    fn product_name(&self) -> &str {
        &self.product_name
    }
    fn units_sold(&self) -> i64 {
        self.units_sold
    }
    fn gross_cents(&self) -> i64 {
        self.gross_cents
    }
}

impl Contribution for AggregatedFact {
    fn key(&self) -> FactKey {
        FactKey { channel: self.channel, period: self.period, sku: self.sku.clone() }
    }
    fn product_name(&self) -> &str {
        &self.product_name
    }
    fn units_sold(&self) -> i64 {
        self.units_sold
    }
    fn gross_cents(&self) -> i64 {
        self.gross_cents
    }
}

/// Group by (channel, period, sku), sum units and value, keep the first
/// non-empty product name in arrival order. The average unit price is
/// computed once, from the sums.
pub fn aggregate<'a, C, I>(items: I) -> Vec<AggregatedFact>
where
    C: Contribution + 'a,
    I: IntoIterator<Item = &'a C>,
{
    let mut groups: BTreeMap<FactKey, (String, i64, i64)> = BTreeMap::new();

    for item in items {
        let entry = groups.entry(item.key()).or_insert_with(|| (String::new(), 0, 0));
        if entry.0.is_empty() && !item.product_name().is_empty() {
            entry.0 = item.product_name().to_string();
        }
        entry.1 = entry.1.saturating_add(item.units_sold());
        entry.2 = entry.2.saturating_add(item.gross_cents());
    }

    groups
        .into_iter()
        .map(|(key, (product_name, units_sold, gross_cents))| AggregatedFact {
            sku: key.sku,
            product_name,
            channel: key.channel,
            period: key.period,
            units_sold,
            gross_cents,
            unit_price_avg: unit_price(gross_cents, units_sold),
        })
        .collect()
}

/// Merge partial fact sets (e.g. one per channel) by re-aggregating their
/// union. Partials are taken in the order given.
pub fn merge(partials: &[Vec<AggregatedFact>]) -> Vec<AggregatedFact> {
    aggregate(partials.iter().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(sku: &str, name: &str, channel: Channel, month: u32, units: i64, cents: i64) -> CanonicalSalesRecord {
        CanonicalSalesRecord {
            sku: sku.into(),
            product_name: name.into(),
            channel,
            period: YearMonth::new(2024, month),
            units_sold: units,
            gross_cents: cents,
        }
    }

    #[test]
    fn sums_and_recomputes_average() {
        let records = vec![
            rec("X1", "", Channel::Shopee, 3, 3, 3000),
            rec("X1", "Sérum", Channel::Shopee, 3, 5, 4999),
        ];
        let facts = aggregate(&records);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].units_sold, 8);
        assert_eq!(facts[0].gross_cents, 7999);
        assert_eq!(facts[0].unit_price_avg, Some(79.99 / 8.0));
        assert_eq!(facts[0].product_name, "Sérum");
    }

    #[test]
    fn first_non_empty_name_wins() {
        let records = vec![
            rec("A", "", Channel::Amazon, 1, 1, 100),
            rec("A", "Primeiro", Channel::Amazon, 1, 1, 100),
            rec("A", "Segundo", Channel::Amazon, 1, 1, 100),
        ];
        assert_eq!(aggregate(&records)[0].product_name, "Primeiro");
    }

    #[test]
    fn key_separates_channel_and_month() {
        let records = vec![
            rec("A", "", Channel::Shopee, 1, 1, 100),
            rec("A", "", Channel::Amazon, 1, 1, 100),
            rec("A", "", Channel::Amazon, 2, 1, 100),
        ];
        let facts = aggregate(&records);
        assert_eq!(facts.len(), 3);
        // ordered by channel, then period, then sku
        assert_eq!(facts[0].channel, Channel::Amazon);
        assert_eq!(facts[0].period, YearMonth::new(2024, 1));
        assert_eq!(facts[1].period, YearMonth::new(2024, 2));
        assert_eq!(facts[2].channel, Channel::Shopee);
    }

    #[test]
    fn zero_units_leave_average_undefined() {
        let facts = aggregate(&[rec("A", "", Channel::Tiny, 1, 0, 500)]);
        assert_eq!(facts[0].unit_price_avg, None);
    }

    fn arb_record() -> impl Strategy<Value = CanonicalSalesRecord> {
        (
            prop::sample::select(vec!["A1", "B2", "C3"]),
            prop::sample::select(vec![Channel::Amazon, Channel::Shopee, Channel::Tiny]),
            1u32..=3,
            -5i64..50,
            -1_000i64..100_000,
        )
            .prop_map(|(sku, channel, month, units, cents)| {
                // the name is a function of the sku so grouping order cannot change it
                rec(sku, &format!("Produto {sku}"), channel, month, units, cents)
            })
    }

    proptest! {
        #[test]
        fn totals_are_conserved(records in prop::collection::vec(arb_record(), 0..60)) {
            let facts = aggregate(&records);
            let units: i64 = records.iter().map(|r| r.units_sold).sum();
            let cents: i64 = records.iter().map(|r| r.gross_cents).sum();
            prop_assert_eq!(facts.iter().map(|f| f.units_sold).sum::<i64>(), units);
            prop_assert_eq!(facts.iter().map(|f| f.gross_cents).sum::<i64>(), cents);
        }

        #[test]
        fn reaggregation_is_idempotent(records in prop::collection::vec(arb_record(), 0..60)) {
            let once = aggregate(&records);
            let twice = aggregate(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn partition_then_merge_matches_whole(
            records in prop::collection::vec(arb_record(), 0..60),
            split in 0usize..60,
        ) {
            let split = split.min(records.len());
            let (left, right) = records.split_at(split);
            let merged = merge(&[aggregate(left), aggregate(right)]);
            prop_assert_eq!(merged, aggregate(&records));
        }

        #[test]
        fn order_does_not_matter(records in prop::collection::vec(arb_record(), 0..60)) {
            let mut reversed = records.clone();
            reversed.reverse();
            prop_assert_eq!(aggregate(&reversed), aggregate(&records));
        }
    }
}
