//! Operation bodies. Each runs on the blocking pool, reads the store once
//! and derives its payload from the grouped rows. No operation writes.
use crate::analytics::inequality::lorenz_and_gini;
use crate::analytics::pareto::{
    abc_classify, cumulative_percent, selected_share, share_percent, threshold_index, top_n, treemap,
};
use crate::analytics::report::{histogram, scatter_sets, write_csv};
use crate::analytics::whatif::{self, WhatIfParams};
use crate::analytics::{fsum, round2, round_to};
use crate::db;
use crate::errors::AnalyticsResult;
use crate::server::params::{RequestParams, WhatIfMode};
use crate::state::{AggregatedRow, AppState, TABLE_COLUMNS};
use portable_atomic::Ordering;
use serde_json::{json, Value};

fn grouped(state: &AppState, params: &RequestParams) -> AnalyticsResult<Vec<AggregatedRow>> {
    let rows = db::fetch_and_group(&state.db, &params.filter)?;
    state.counters.record_rows(rows.len());
    tracing::debug!(groupby = %params.filter.group_by, rows = rows.len(), "grouped");
    Ok(rows)
}

fn split(rows: &[AggregatedRow]) -> (Vec<String>, Vec<f64>) {
    rows.iter().map(|r| (r.label.clone(), r.sum_profit)).unzip()
}

#[inline]
fn rounded(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| round2(v)).collect()
}

pub fn pareto(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    let (labels, profit) = split(&rows);
    let cum = cumulative_percent(&profit);
    let idx = threshold_index(&cum, params.threshold);
    let top_threshold: &[String] = if idx >= 0 { &labels[..=idx as usize] } else { &[] };

    Ok(json!({
        "labels": labels,
        "profit": profit,
        "cum_pct": rounded(&cum),
        "sum_profit": round2(fsum(&profit)),
        "idx_threshold": idx,
        "top_threshold": top_threshold,
        "selected_share_pct": selected_share(&labels, &profit, &params.selected),
        "table": {
            "columns": TABLE_COLUMNS,
            "rows": rows,
        },
    }))
}

/// Shares are relative to the Top-N slice itself.
pub fn topn(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    let (labels, profit) = split(top_n(&rows, params.n));
    let share = share_percent(&profit, fsum(&profit));
    Ok(json!({
        "labels": labels,
        "profit": profit,
        "share_pct": rounded(&share),
    }))
}

pub fn abc(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    let (labels, profit) = split(&rows);
    let report = abc_classify(&labels, &profit, params.threshold, params.threshold_b);
    if params.threshold >= params.threshold_b {
        tracing::debug!(a = params.threshold, b = params.threshold_b, "class B window is empty");
    }
    Ok(json!({
        "items": report.items,
        "summary": report.summary,
        "thresholds": { "A": params.threshold, "B": params.threshold_b },
    }))
}

pub fn lorenz(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    let profit: Vec<f64> = rows.iter().map(|r| r.sum_profit).collect();
    let curve = lorenz_and_gini(&profit);
    Ok(json!({
        "x": curve.x,
        "y": curve.y,
        "gini": round_to(curve.gini, 4),
    }))
}

pub fn scatter(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    Ok(json!({ "sets": scatter_sets(&rows) }))
}

pub fn hist(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    let ppc: Vec<f64> = rows.iter().map(|r| r.avg_ppc).collect();
    let unit: Vec<f64> = rows.iter().map(|r| r.avg_unit_profit).collect();
    Ok(json!({
        "ppc": histogram(&ppc, params.bins),
        "unit": histogram(&unit, params.bins),
    }))
}

pub fn treemap_op(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let rows = grouped(state, params)?;
    let (labels, profit) = split(&rows);
    Ok(json!({ "root": treemap(&labels, &profit, params.threshold, params.threshold_b) }))
}

pub fn whatif(state: &AppState, params: &RequestParams) -> AnalyticsResult<Value> {
    let sim = WhatIfParams::from_pct(params.price_delta_pct, params.sales_uplift_pct);
    let result = match params.mode {
        WhatIfMode::Grouped => {
            let rows = grouped(state, params)?;
            whatif::simulate(&rows, &params.selected, sim, params.threshold)
        }
        WhatIfMode::Rows => {
            let raw = db::fetch_raw(&state.db, &params.filter)?;
            state.counters.record_rows(raw.len());
            whatif::simulate_raw(&raw, &params.selected, sim, params.threshold)
        }
    };

    Ok(json!({
        "labels": result.labels,
        "profit": result.profit,
        "cum_pct": rounded(&result.cum_pct),
        "sum_profit": round2(fsum(&result.profit)),
        "idx_threshold": result.idx_threshold,
        "params": {
            "selected": params.selected,
            "price_delta_pct": params.price_delta_pct,
            "sales_uplift_pct": params.sales_uplift_pct,
            "groupby": params.filter.group_by,
            "mode": params.mode,
        },
    }))
}

/// CSV bytes of the grouped rows with their cumulative percentages.
pub fn export(state: &AppState, params: &RequestParams) -> AnalyticsResult<Vec<u8>> {
    let rows = grouped(state, params)?;
    let profit: Vec<f64> = rows.iter().map(|r| r.sum_profit).collect();
    let cum = cumulative_percent(&profit);
    let mut buf = Vec::with_capacity(64 * (rows.len() + 1));
    write_csv(&rows, &cum, &mut buf)?;
    state.counters.exports_written.fetch_add(1, Ordering::Relaxed);
    Ok(buf)
}

pub fn overview(state: &AppState) -> AnalyticsResult<Value> {
    let counts = crate::overview::resolve_all(&state.db, &crate::overview::default_chains())?;
    Ok(json!({ "counts": counts }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::fixtures::seeded_db;
    use crate::server::params::RawParams;
    use std::sync::Arc;

    fn app() -> Arc<AppState> {
        AppState::new(AppConfig::default(), seeded_db())
    }

    fn params(raw: RawParams) -> RequestParams {
        RequestParams::from_raw(&raw, &AppConfig::default())
    }

    #[test]
    fn test_pareto_payload() {
        let state = app();
        let v = pareto(&state, &params(RawParams::default())).unwrap();
        assert_eq!(v["labels"], json!(["Burger", "Pizza", "Salad"]));
        assert_eq!(v["cum_pct"], json!([50.0, 75.0, 100.0]));
        assert_eq!(v["idx_threshold"], json!(2));
        assert_eq!(v["sum_profit"], json!(200.0));
        assert_eq!(v["top_threshold"], json!(["Burger", "Pizza", "Salad"]));
        assert_eq!(v["selected_share_pct"], Value::Null);
        assert_eq!(v["table"]["columns"][0], json!("label"));
        assert_eq!(v["table"]["rows"][1]["sum_sales"], json!(10));
    }

    #[test]
    fn test_pareto_selected_share() {
        let state = app();
        let v = pareto(
            &state,
            &params(RawParams { selected: Some("Pizza".into()), ..Default::default() }),
        )
        .unwrap();
        assert_eq!(v["selected_share_pct"], json!(25.0));
    }

    #[test]
    fn test_topn_shares_within_slice() {
        let state = app();
        let v = topn(&state, &params(RawParams { n: Some("2".into()), ..Default::default() })).unwrap();
        assert_eq!(v["labels"], json!(["Burger", "Pizza"]));
        assert_eq!(v["share_pct"], json!([66.67, 33.33]));
    }

    #[test]
    fn test_abc_payload() {
        let state = app();
        let v = abc(&state, &params(RawParams::default())).unwrap();
        assert_eq!(v["items"][0]["class"], json!("A"));
        assert_eq!(v["items"][1]["class"], json!("A"));
        assert_eq!(v["items"][2]["class"], json!("C"));
        assert_eq!(v["summary"]["A"]["count"], json!(2));
        assert_eq!(v["summary"]["total"], json!(200.0));
        assert_eq!(v["thresholds"], json!({ "A": 80.0, "B": 95.0 }));
    }

    #[test]
    fn test_lorenz_payload() {
        let state = app();
        let v = lorenz(&state, &params(RawParams::default())).unwrap();
        assert_eq!(v["x"].as_array().unwrap().len(), 4);
        // sorted [50, 50, 100] → y = 0, .25, .5, 1 → area 0.4166.. → gini 0.1667
        assert_eq!(v["gini"], json!(0.1667));
    }

    #[test]
    fn test_whatif_modes_agree_on_uniform_rows() {
        let state = app();
        let raw = RawParams {
            price_delta_pct: Some("10".into()),
            ..Default::default()
        };
        let grouped_v = whatif(&state, &params(raw.clone())).unwrap();
        let rows_v = whatif(&state, &params(RawParams { mode: Some("rows".into()), ..raw })).unwrap();
        // every fixture row has price 10, cost 6, sales 5
        assert_eq!(grouped_v["labels"], json!(["Pizza", "Burger", "Salad"]));
        assert_eq!(grouped_v["sum_profit"], rows_v["sum_profit"]);
        assert_eq!(grouped_v["params"]["mode"], json!("grouped"));
        assert_eq!(rows_v["params"]["mode"], json!("rows"));
    }

    #[test]
    fn test_treemap_and_hist_shapes() {
        let state = app();
        let t = treemap_op(&state, &params(RawParams::default())).unwrap();
        assert_eq!(t["root"]["children"].as_array().unwrap().len(), 3);
        let h = hist(&state, &params(RawParams { bins: Some("4".into()), ..Default::default() })).unwrap();
        assert_eq!(h["ppc"]["hist"].as_array().unwrap().len(), 4);
        assert_eq!(h["ppc"]["edges"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_export_counts() {
        let state = app();
        let csv = export(&state, &params(RawParams::default())).unwrap();
        let text = String::from_utf8(csv).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(state.counters.exports_written.load(Ordering::Relaxed), 1);
    }
}
