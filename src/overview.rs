//! Store overview counts.
//!
//! The tables behind most counts belong to other services and may be
//! missing from this database. Each count is a `SourceChain`: sources
//! are tried in order, the first one that answers wins, otherwise the
//! chain's default is reported.
use crate::db::DbPool;
use crate::errors::{AnalyticsError, AnalyticsResult};
use rusqlite::Connection;

/// `SELECT COUNT(..)` against one table, skipped when the table is absent.
#[derive(Debug, Clone)]
pub struct CountSource {
    pub table: &'static str,
    pub sql: &'static str,
}

impl CountSource {
    pub const fn new(table: &'static str, sql: &'static str) -> Self {
        Self { table, sql }
    }

    pub fn fetch(&self, conn: &Connection) -> Option<i64> {
        if !table_exists(conn, self.table) {
            return None;
        }
        match conn.query_row(self.sql, [], |row| row.get::<_, i64>(0)) {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(table = self.table, error = %e, "count source failed");
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceChain {
    pub name: &'static str,
    pub sources: Vec<CountSource>,
    pub default: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResolvedCount {
    pub name: &'static str,
    pub value: i64,
    /// Table that answered; `None` when the default was used.
    pub source: Option<&'static str>,
}

impl SourceChain {
    pub fn resolve(&self, conn: &Connection) -> ResolvedCount {
        for src in &self.sources {
            if let Some(value) = src.fetch(conn) {
                return ResolvedCount {
                    name: self.name,
                    value,
                    source: Some(src.table),
                };
            }
        }
        ResolvedCount {
            name: self.name,
            value: self.default,
            source: None,
        }
    }
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .is_ok()
}

fn chain(name: &'static str, sources: Vec<CountSource>) -> SourceChain {
    SourceChain {
        name,
        sources,
        default: 0,
    }
}

/// Chains behind `/api/overview`, in display order.
pub fn default_chains() -> Vec<SourceChain> {
    vec![
        chain(
            "metric_records",
            vec![CountSource::new("product_metric", "SELECT COUNT(*) FROM product_metric")],
        ),
        chain(
            "distinct_products",
            vec![CountSource::new(
                "product_metric",
                "SELECT COUNT(DISTINCT product_id) FROM product_metric",
            )],
        ),
        chain(
            "total_businesses",
            vec![
                CountSource::new("accounts_businesses", "SELECT COUNT(*) FROM accounts_businesses"),
                CountSource::new("dashboard_businesses", "SELECT COUNT(*) FROM dashboard_businesses"),
            ],
        ),
        chain(
            "active_businesses",
            vec![
                CountSource::new(
                    "accounts_businessmembership",
                    "SELECT COUNT(DISTINCT business_id) FROM accounts_businessmembership WHERE is_active = 1",
                ),
                CountSource::new(
                    "dashboard_businesses",
                    "SELECT COUNT(*) FROM dashboard_businesses WHERE status = 'active'",
                ),
            ],
        ),
        chain(
            "total_menus",
            vec![CountSource::new("menu_menu", "SELECT COUNT(*) FROM menu_menu")],
        ),
        chain(
            "active_menus",
            vec![CountSource::new("menu_menu", "SELECT COUNT(*) FROM menu_menu WHERE is_active = 1")],
        ),
        chain(
            "total_orders",
            vec![CountSource::new("orders_order", "SELECT COUNT(*) FROM orders_order")],
        ),
        chain(
            "pending_orders",
            vec![CountSource::new(
                "orders_order",
                "SELECT COUNT(*) FROM orders_order WHERE order_status = 'pending'",
            )],
        ),
        chain(
            "total_metrics",
            vec![CountSource::new(
                "performance_performancemetric",
                "SELECT COUNT(*) FROM performance_performancemetric",
            )],
        ),
        chain(
            "total_goals",
            vec![CountSource::new("performance_goal", "SELECT COUNT(*) FROM performance_goal")],
        ),
    ]
}

pub fn resolve_all(db: &DbPool, chains: &[SourceChain]) -> AnalyticsResult<Vec<ResolvedCount>> {
    let conn = db.lock().map_err(|e| AnalyticsError::Database(format!("lock: {e}")))?;
    Ok(chains.iter().map(|c| c.resolve(&conn)).collect())
}
