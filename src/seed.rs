//! CSV metric loader.
//!
//! Parses metric CSV files into `MetricRecord`s for seeding the store.
//! Expected columns (header row required, order free):
//!   product_id, product_name, click, sales, click_per_sale, cost,
//!   sales_price, unit_profit, total_profit, profit_per_click, ts
//! Numeric columns and `ts` (YYYY-MM-DD) may be empty or absent.

use crate::db::{self, DbPool};
use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::state::MetricRecord;
use std::io::Read;
use std::path::Path;

/// Load metric records from a CSV reader.
pub fn load_metric_csv<R: Read>(reader: R) -> AnalyticsResult<Vec<MetricRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line_num, result) in csv_reader.deserialize().enumerate() {
        let record: MetricRecord =
            result.map_err(|e| AnalyticsError::Csv(format!("line {}: {}", line_num + 2, e)))?;
        records.push(record);
    }

    Ok(records)
}

/// Seed an empty store from `path`. A store that already holds rows is
/// left alone. Returns the number of rows inserted.
pub fn seed_if_empty(db: &DbPool, path: &Path) -> AnalyticsResult<usize> {
    let existing = db::record_count(db)?;
    if existing > 0 {
        tracing::info!(existing, "store already populated, skipping seed");
        return Ok(0);
    }
    let file = std::fs::File::open(path)
        .map_err(|e| AnalyticsError::Io(format!("open '{}': {e}", path.display())))?;
    let records = load_metric_csv(file)?;
    let inserted = db::insert_metrics(db, &records)?;
    tracing::info!(inserted, path = %path.display(), "seeded metric store");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MetricFilter;

    const SAMPLE_CSV: &str = "\
product_id,product_name,click,sales,cost,sales_price,unit_profit,total_profit,profit_per_click,ts
1,Burger,100,20,6.5,12,5.5,110,1.1,2024-03-01
2,Ayran,40,30,1,3,2,60,1.5,
3,Soup,,,,,,,,2024-03-02
";

    #[test]
    fn test_load_sample_csv() {
        let records = load_metric_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].product_name, "Burger");
        assert_eq!(records[0].click, Some(100));
        assert_eq!(records[0].ts.map(|d| d.to_string()), Some("2024-03-01".to_string()));
        assert_eq!(records[1].ts, None);
        assert_eq!(records[2].total_profit, None);
        assert_eq!(records[2].click_per_sale, None);
    }

    #[test]
    fn test_bad_number_reports_line() {
        let csv_data = "product_id,product_name,total_profit\n1,A,abc\n";
        let err = load_metric_csv(csv_data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_seed_only_when_empty() {
        let dir = std::env::temp_dir().join(format!("pareto-seed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("metrics.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let db = db::init_memory_db().unwrap();
        assert_eq!(seed_if_empty(&db, &path).unwrap(), 3);
        assert_eq!(seed_if_empty(&db, &path).unwrap(), 0);
        let rows = db::fetch_and_group(&db, &MetricFilter::default()).unwrap();
        assert_eq!(rows[0].label, "Burger");

        std::fs::remove_dir_all(&dir).ok();
    }
}
