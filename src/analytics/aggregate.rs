use super::CompensatedSum;
use crate::state::{AggregatedRow, GroupKey, MetricRecord};
use std::collections::HashMap;

/// Running totals for one group. Missing values count as 0 and the row
/// still counts toward every average.
#[derive(Default)]
struct GroupAcc {
    profit: CompensatedSum,
    click: i64,
    sales: i64,
    cost: CompensatedSum,
    price: CompensatedSum,
    unit_profit: CompensatedSum,
    ppc: CompensatedSum,
    rows: usize,
}

impl GroupAcc {
    fn push(&mut self, r: &MetricRecord) {
        self.profit.add(r.total_profit.unwrap_or(0.0));
        self.click += r.click.unwrap_or(0);
        self.sales += r.sales.unwrap_or(0);
        self.cost.add(r.cost.unwrap_or(0.0));
        self.price.add(r.sales_price.unwrap_or(0.0));
        self.unit_profit.add(r.unit_profit.unwrap_or(0.0));
        self.ppc.add(r.profit_per_click.unwrap_or(0.0));
        self.rows += 1;
    }

    fn finish(self, label: String) -> AggregatedRow {
        let n = self.rows.max(1) as f64;
        AggregatedRow {
            label,
            sum_profit: self.profit.value(),
            sum_click: self.click,
            sum_sales: self.sales,
            avg_cost: self.cost.value() / n,
            avg_price: self.price.value() / n,
            avg_unit_profit: self.unit_profit.value() / n,
            avg_ppc: self.ppc.value() / n,
        }
    }
}

/// Group records by `key` and aggregate each group.
///
/// One row per distinct key value, sorted descending by `sum_profit`
/// with ties broken by label. Empty input yields an empty vector.
pub fn aggregate(records: &[MetricRecord], key: GroupKey) -> Vec<AggregatedRow> {
    let mut groups: HashMap<String, GroupAcc> = HashMap::new();
    for r in records {
        groups.entry(r.label(key)).or_default().push(r);
    }

    let mut rows: Vec<AggregatedRow> = groups
        .into_iter()
        .map(|(label, acc)| acc.finish(label))
        .collect();
    sort_by_profit_desc(&mut rows);

    tracing::debug!(records = records.len(), groups = rows.len(), key = %key, "aggregated");
    rows
}

pub fn sort_by_profit_desc(rows: &mut [AggregatedRow]) {
    rows.sort_by(|a, b| {
        b.sum_profit
            .total_cmp(&a.sum_profit)
            .then_with(|| a.label.cmp(&b.label))
    });
}
