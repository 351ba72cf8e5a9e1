use crate::config::AppConfig;
use crate::db::DbPool;
use chrono::NaiveDate;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Grouping ──

/// Grouping granularity for every computation in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    Id,
    #[default]
    Name,
}

impl GroupKey {
    /// `id` selects product ids, anything else groups by name.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("id") {
            Self::Id
        } else {
            Self::Name
        }
    }

    /// Column in `product_metric` the store groups on.
    #[inline]
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "product_id",
            Self::Name => "product_name",
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id => write!(f, "id"),
            Self::Name => write!(f, "name"),
        }
    }
}

// ── Filter criteria (already validated/coerced by the request layer) ──

#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: String,
    pub group_by: GroupKey,
    pub product_ids: Vec<i64>,
}

// ── Store records ──

/// One row of `product_metric`. Numeric columns are nullable in the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricRecord {
    pub product_id: i64,
    pub product_name: String,
    pub click: Option<i64>,
    pub sales: Option<i64>,
    pub click_per_sale: Option<f64>,
    pub cost: Option<f64>,
    pub sales_price: Option<f64>,
    pub unit_profit: Option<f64>,
    pub total_profit: Option<f64>,
    pub profit_per_click: Option<f64>,
    pub ts: Option<NaiveDate>,
}

impl MetricRecord {
    /// Display label of this record under `key`.
    pub fn label(&self, key: GroupKey) -> String {
        match key {
            GroupKey::Id => self.product_id.to_string(),
            GroupKey::Name => self.product_name.clone(),
        }
    }
}

/// Per-record inputs of the row-level what-if simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetricRow {
    pub label: String,
    pub cost: f64,
    pub sales_price: f64,
    pub sales: f64,
}

/// One group of the filtered record set. Created fresh per request.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregatedRow {
    pub label: String,
    pub sum_profit: f64,
    pub sum_click: i64,
    pub sum_sales: i64,
    pub avg_cost: f64,
    pub avg_price: f64,
    pub avg_unit_profit: f64,
    pub avg_ppc: f64,
}

/// Column names of the pareto table, in `AggregatedRow` field order.
pub const TABLE_COLUMNS: [&str; 8] = [
    "label",
    "sum_profit",
    "sum_click",
    "sum_sales",
    "avg_cost",
    "avg_price",
    "avg_unit_profit",
    "avg_ppc",
];

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub requests_served: AtomicU64,
    pub requests_failed: AtomicU64,
    pub rows_aggregated: AtomicU64,
    pub exports_written: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            rows_aggregated: AtomicU64::new(0),
            exports_written: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_success(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rows(&self, rows: usize) {
        self.rows_aggregated.fetch_add(rows as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Application shared state ──

/// Everything a handler needs. Nothing here holds per-request data.
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            counters: PerfCounters::new(),
        })
    }
}
