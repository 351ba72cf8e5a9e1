use crate::analytics::pareto::DEFAULT_THRESHOLD_B;
use crate::analytics::report::MAX_BINS;
use crate::config::AppConfig;
use crate::state::{GroupKey, MetricFilter};
use chrono::NaiveDate;

/// Bounds applied to a caller-supplied class-A threshold.
pub const THRESHOLD_MIN: f64 = 50.0;
pub const THRESHOLD_MAX: f64 = 95.0;
pub const DEFAULT_TOP_N: i64 = 10;

/// Query string as received. Every field is free text; nothing here can
/// fail to deserialize because of a bad number.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct RawParams {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub groupby: Option<String>,
    pub product_ids: Option<String>,
    pub threshold: Option<String>,
    pub threshold_b: Option<String>,
    pub n: Option<String>,
    pub bins: Option<String>,
    pub price_delta_pct: Option<String>,
    pub sales_uplift_pct: Option<String>,
    pub selected: Option<String>,
    pub mode: Option<String>,
}

/// Which what-if variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WhatIfMode {
    /// Group averages (`avg_price`, `avg_cost`, `sum_sales`).
    #[default]
    Grouped,
    /// Record by record, summed per label afterwards.
    Rows,
}

/// Coerced request parameters. Bad input falls back to defaults.
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub filter: MetricFilter,
    pub threshold: f64,
    pub threshold_b: f64,
    pub n: i64,
    pub bins: usize,
    pub price_delta_pct: f64,
    pub sales_uplift_pct: f64,
    pub selected: Vec<String>,
    pub mode: WhatIfMode,
}

impl RequestParams {
    pub fn from_raw(raw: &RawParams, config: &AppConfig) -> Self {
        let filter = MetricFilter {
            date_from: parse_date(raw.date_from.as_deref()),
            date_to: parse_date(raw.date_to.as_deref()),
            search: raw.search.as_deref().unwrap_or("").trim().to_string(),
            group_by: GroupKey::parse(raw.groupby.as_deref().unwrap_or("name")),
            product_ids: parse_id_list(raw.product_ids.as_deref()),
        };

        let threshold = parse_f64(raw.threshold.as_deref())
            .unwrap_or(config.default_threshold)
            .clamp(THRESHOLD_MIN, THRESHOLD_MAX);

        let bins = parse_f64(raw.bins.as_deref())
            .filter(|b| *b >= 1.0 && *b <= MAX_BINS as f64)
            .map(|b| b as usize)
            .unwrap_or(config.default_bins);

        Self {
            filter,
            threshold,
            threshold_b: parse_f64(raw.threshold_b.as_deref()).unwrap_or(DEFAULT_THRESHOLD_B),
            n: parse_f64(raw.n.as_deref()).map(|n| n as i64).unwrap_or(DEFAULT_TOP_N),
            bins,
            price_delta_pct: parse_f64(raw.price_delta_pct.as_deref()).unwrap_or(0.0),
            sales_uplift_pct: parse_f64(raw.sales_uplift_pct.as_deref()).unwrap_or(0.0),
            selected: parse_list(raw.selected.as_deref()),
            mode: match raw.mode.as_deref().map(str::trim) {
                Some(m) if m.eq_ignore_ascii_case("rows") => WhatIfMode::Rows,
                _ => WhatIfMode::Grouped,
            },
        }
    }
}

/// Finite number or nothing. Accepts a leading `+`.
fn parse_f64(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_id_list(raw: Option<&str>) -> Vec<i64> {
    parse_list(raw)
        .iter()
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}
