use crate::analytics::aggregate;
use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::state::{AggregatedRow, MetricFilter, MetricRecord, RawMetricRow};
use chrono::NaiveDate;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DbPool = Arc<Mutex<Connection>>;

pub fn init_db(data_dir: &Path) -> AnalyticsResult<DbPool> {
    std::fs::create_dir_all(data_dir).map_err(|e| AnalyticsError::Database(format!("create dir: {e}")))?;
    let db_path = data_dir.join("pareto.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA cache_size=-64000;")?;
    apply_schema(&conn)?;
    register_functions(&conn)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// Fresh in-memory store with the schema applied.
#[cfg(test)]
pub fn init_memory_db() -> AnalyticsResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    apply_schema(&conn)?;
    register_functions(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn apply_schema(conn: &Connection) -> AnalyticsResult<()> {
    let schema = include_str!("../migrations/001_init.sql");
    conn.execute_batch(schema)?;
    Ok(())
}

/// `casefold(text)`: Unicode lowercase. SQLite's own `lower`/`LIKE` only fold ASCII.
fn register_functions(conn: &Connection) -> AnalyticsResult<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

// ── Filter translation ──

/// WHERE clause plus positional parameters for a filter.
struct FilterSql {
    clause: String,
    params: Vec<Box<dyn ToSql>>,
}

fn filter_sql(filter: &MetricFilter) -> FilterSql {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(from) = filter.date_from {
        params.push(Box::new(from.format("%Y-%m-%d").to_string()));
        conds.push(format!("ts >= ?{}", params.len()));
    }
    if let Some(to) = filter.date_to {
        params.push(Box::new(to.format("%Y-%m-%d").to_string()));
        conds.push(format!("ts <= ?{}", params.len()));
    }
    let search = filter.search.trim();
    if !search.is_empty() {
        params.push(Box::new(search.to_lowercase()));
        conds.push(format!("instr(casefold(product_name), ?{}) > 0", params.len()));
    }
    if !filter.product_ids.is_empty() {
        let mut slots = Vec::with_capacity(filter.product_ids.len());
        for id in &filter.product_ids {
            params.push(Box::new(*id));
            slots.push(format!("?{}", params.len()));
        }
        conds.push(format!("product_id IN ({})", slots.join(", ")));
    }

    let clause = if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    };
    FilterSql { clause, params }
}

fn parse_ts(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

// ── Query helpers (read path, called from the blocking pool) ──

/// All records matching `filter`, in insertion order.
pub fn fetch_records(db: &DbPool, filter: &MetricFilter) -> AnalyticsResult<Vec<MetricRecord>> {
    let conn = db.lock().map_err(|e| AnalyticsError::Database(format!("lock: {e}")))?;
    let f = filter_sql(filter);
    let sql = format!(
        "SELECT product_id, product_name, click, sales, click_per_sale, cost, sales_price, unit_profit, total_profit, profit_per_click, ts FROM product_metric{} ORDER BY id",
        f.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(f.params.iter()), |row| {
        Ok(MetricRecord {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            click: row.get(2)?,
            sales: row.get(3)?,
            click_per_sale: row.get(4)?,
            cost: row.get(5)?,
            sales_price: row.get(6)?,
            unit_profit: row.get(7)?,
            total_profit: row.get(8)?,
            profit_per_click: row.get(9)?,
            ts: parse_ts(row.get(10)?),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Filter, then group by `filter.group_by`. Sorted descending by profit.
pub fn fetch_and_group(db: &DbPool, filter: &MetricFilter) -> AnalyticsResult<Vec<AggregatedRow>> {
    let records = fetch_records(db, filter)?;
    Ok(aggregate::aggregate(&records, filter.group_by))
}

/// Per-record `(label, cost, price, sales)` with NULLs read as 0.
pub fn fetch_raw(db: &DbPool, filter: &MetricFilter) -> AnalyticsResult<Vec<RawMetricRow>> {
    let conn = db.lock().map_err(|e| AnalyticsError::Database(format!("lock: {e}")))?;
    let f = filter_sql(filter);
    let sql = format!(
        "SELECT CAST({} AS TEXT), COALESCE(cost, 0.0), COALESCE(sales_price, 0.0), COALESCE(sales, 0) FROM product_metric{} ORDER BY id",
        filter.group_by.column(),
        f.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(f.params.iter()), |row| {
        Ok(RawMetricRow {
            label: row.get(0)?,
            cost: row.get(1)?,
            sales_price: row.get(2)?,
            sales: row.get::<_, f64>(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn record_count(db: &DbPool) -> AnalyticsResult<i64> {
    let conn = db.lock().map_err(|e| AnalyticsError::Database(format!("lock: {e}")))?;
    let n = conn.query_row("SELECT COUNT(*) FROM product_metric", [], |row| row.get(0))?;
    Ok(n)
}

// ── Writes (seeding and tests only; the store is owned elsewhere) ──

/// Insert all records in one transaction. Returns the number inserted.
pub fn insert_metrics(db: &DbPool, records: &[MetricRecord]) -> AnalyticsResult<usize> {
    let mut conn = db.lock().map_err(|e| AnalyticsError::Database(format!("lock: {e}")))?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO product_metric (product_id, product_name, click, sales, click_per_sale, cost, sales_price, unit_profit, total_profit, profit_per_click, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for r in records {
            stmt.execute(rusqlite::params![
                r.product_id,
                r.product_name,
                r.click,
                r.sales,
                r.click_per_sale,
                r.cost,
                r.sales_price,
                r.unit_profit,
                r.total_profit,
                r.profit_per_click,
                r.ts.map(|d| d.format("%Y-%m-%d").to_string()),
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}
