use super::round2;
use crate::errors::AnalyticsResult;
use crate::state::AggregatedRow;
use statrs::statistics::Statistics;
use std::io::{Read, Write};

// ── Histogram ──

/// Upper bound on histogram bins; larger requests are clamped.
pub const MAX_BINS: usize = 1000;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Histogram {
    #[serde(rename = "hist")]
    pub counts: Vec<u64>,
    pub edges: Vec<f64>,
}

/// Equal-width histogram between min and max.
///
/// `bins + 1` edges, last bin closed on the right. All-equal input gives a
/// single bin `[v, v]`; empty input gives empty vectors. Non-finite values
/// are skipped. `bins` must be at least 1 and is clamped to `MAX_BINS`.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Histogram {
            counts: Vec::new(),
            edges: Vec::new(),
        };
    }

    let mn = Statistics::min(&finite);
    let mx = Statistics::max(&finite);
    if mn == mx {
        return Histogram {
            counts: vec![finite.len() as u64],
            edges: vec![mn, mx],
        };
    }

    let bins = bins.min(MAX_BINS);
    let step = (mx - mn) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| mn + i as f64 * step).collect();
    let mut counts = vec![0u64; bins];
    for v in &finite {
        let k = (((v - mn) / step) as usize).min(bins - 1);
        counts[k] += 1;
    }

    Histogram { counts, edges }
}

// ── Scatter sets ──

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScatterPoint<X, Y> {
    pub x: X,
    pub y: Y,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScatterSets {
    pub click_profit: Vec<ScatterPoint<i64, f64>>,
    pub sales_profit: Vec<ScatterPoint<i64, f64>>,
    pub ppc_click: Vec<ScatterPoint<f64, i64>>,
    pub unit_sales: Vec<ScatterPoint<f64, i64>>,
}

fn points<X, Y>(rows: &[AggregatedRow], pick: impl Fn(&AggregatedRow) -> (X, Y)) -> Vec<ScatterPoint<X, Y>> {
    rows.iter()
        .map(|r| {
            let (x, y) = pick(r);
            ScatterPoint {
                x,
                y,
                label: r.label.clone(),
            }
        })
        .collect()
}

/// Field pairs of the aggregated rows, one point per group.
pub fn scatter_sets(rows: &[AggregatedRow]) -> ScatterSets {
    ScatterSets {
        click_profit: points(rows, |r| (r.sum_click, r.sum_profit)),
        sales_profit: points(rows, |r| (r.sum_sales, r.sum_profit)),
        ppc_click: points(rows, |r| (r.avg_ppc, r.sum_click)),
        unit_sales: points(rows, |r| (r.avg_unit_profit, r.sum_sales)),
    }
}

// ── CSV export ──

pub const EXPORT_HEADER: [&str; 9] = [
    "Label",
    "Total Profit",
    "Cumulative %",
    "Clicks",
    "Sales",
    "Avg Cost",
    "Avg Price",
    "Avg Unit Profit",
    "Avg Profit/Click",
];

/// One parsed line of an export.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Total Profit")]
    pub total_profit: f64,
    #[serde(rename = "Cumulative %")]
    pub cum_pct: f64,
    #[serde(rename = "Clicks")]
    pub clicks: i64,
    #[serde(rename = "Sales")]
    pub sales: i64,
    #[serde(rename = "Avg Cost")]
    pub avg_cost: f64,
    #[serde(rename = "Avg Price")]
    pub avg_price: f64,
    #[serde(rename = "Avg Unit Profit")]
    pub avg_unit_profit: f64,
    #[serde(rename = "Avg Profit/Click")]
    pub avg_ppc: f64,
}

#[inline]
fn fixed2(v: f64) -> String {
    format!("{:.2}", round2(v))
}

/// Write `rows` with their cumulative percentages as CSV.
/// `cum` must be the series derived from `rows`.
pub fn write_csv<W: Write>(rows: &[AggregatedRow], cum: &[f64], writer: W) -> AnalyticsResult<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(EXPORT_HEADER)?;
    for (r, &c) in rows.iter().zip(cum) {
        w.write_record([
            r.label.clone(),
            fixed2(r.sum_profit),
            fixed2(c),
            r.sum_click.to_string(),
            r.sum_sales.to_string(),
            fixed2(r.avg_cost),
            fixed2(r.avg_price),
            fixed2(r.avg_unit_profit),
            fixed2(r.avg_ppc),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Parse an export produced by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> AnalyticsResult<Vec<ExportRow>> {
    let mut r = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = Vec::new();
    for row in r.deserialize() {
        out.push(row?);
    }
    Ok(out)
}
