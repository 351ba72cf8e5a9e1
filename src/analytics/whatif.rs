//! Counterfactual profit under price and volume changes.
//!
//! new_unit  = avg_price * (1 + price_delta) - avg_cost
//! new_sales = sales * (1 + sales_uplift)
//! new_total = new_unit * new_sales
//!
//! Deltas are fractions (0.10 = +10%). Only selected labels change; an
//! empty selection selects everything. Works on in-memory rows only.
use super::pareto::{cumulative_percent, threshold_index};
use super::CompensatedSum;
use crate::state::{AggregatedRow, RawMetricRow};
use std::collections::{HashMap, HashSet};

/// Simulation inputs. Stack-friendly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhatIfParams {
    pub price_delta: f64,
    pub sales_uplift: f64,
}

impl WhatIfParams {
    /// From wire percentages (`10` = +10%).
    pub fn from_pct(price_delta_pct: f64, sales_uplift_pct: f64) -> Self {
        Self {
            price_delta: price_delta_pct / 100.0,
            sales_uplift: sales_uplift_pct / 100.0,
        }
    }

    #[inline]
    fn total_profit(&self, price: f64, cost: f64, sales: f64) -> f64 {
        let new_unit = price * (1.0 + self.price_delta) - cost;
        let new_sales = sales * (1.0 + self.sales_uplift);
        new_unit * new_sales
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhatIfResult {
    pub labels: Vec<String>,
    pub profit: Vec<f64>,
    pub cum_pct: Vec<f64>,
    pub idx_threshold: i64,
}

struct Selection<'a>(HashSet<&'a str>);

impl<'a> Selection<'a> {
    fn new(selected: &'a [String]) -> Self {
        Self(selected.iter().map(String::as_str).collect())
    }

    #[inline]
    fn applies_to(&self, label: &str) -> bool {
        self.0.is_empty() || self.0.contains(label)
    }
}

/// Simulate on grouped rows using each group's average price and cost.
/// Unselected groups keep their aggregated profit.
pub fn simulate(rows: &[AggregatedRow], selected: &[String], params: WhatIfParams, threshold: f64) -> WhatIfResult {
    let selection = Selection::new(selected);
    let simulated: Vec<(String, f64)> = rows
        .iter()
        .map(|r| {
            let profit = if selection.applies_to(&r.label) {
                params.total_profit(r.avg_price, r.avg_cost, r.sum_sales as f64)
            } else {
                r.sum_profit
            };
            (r.label.clone(), profit)
        })
        .collect();
    finish(simulated, threshold)
}

/// Simulate record by record, then sum per label.
/// Unselected records contribute `(price - cost) * sales`.
pub fn simulate_raw(raw: &[RawMetricRow], selected: &[String], params: WhatIfParams, threshold: f64) -> WhatIfResult {
    let selection = Selection::new(selected);
    let unchanged = WhatIfParams {
        price_delta: 0.0,
        sales_uplift: 0.0,
    };
    let mut sums: HashMap<&str, CompensatedSum> = HashMap::new();
    for r in raw {
        let p = if selection.applies_to(&r.label) { &params } else { &unchanged };
        sums.entry(r.label.as_str())
            .or_default()
            .add(p.total_profit(r.sales_price, r.cost, r.sales));
    }
    let simulated = sums
        .into_iter()
        .map(|(label, acc)| (label.to_string(), acc.value()))
        .collect();
    finish(simulated, threshold)
}

fn finish(mut simulated: Vec<(String, f64)>, threshold: f64) -> WhatIfResult {
    simulated.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let (labels, profit): (Vec<String>, Vec<f64>) = simulated.into_iter().unzip();
    let cum_pct = cumulative_percent(&profit);
    let idx_threshold = threshold_index(&cum_pct, threshold);
    WhatIfResult {
        labels,
        profit,
        cum_pct,
        idx_threshold,
    }
}
