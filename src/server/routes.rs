use crate::errors::AnalyticsResult;
use crate::server::ops;
use crate::server::params::{RawParams, RequestParams};
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

type RawQuery = Result<Query<RawParams>, QueryRejection>;

/// The single operation boundary.
///
/// Runs `op` on the blocking pool and folds every way it can go wrong
/// (store or parse error, panic in the worker) into a message.
/// Nothing partial escapes: the caller gets the value or the message.
pub async fn run_operation<T, F>(state: Arc<AppState>, name: &'static str, op: F) -> Result<T, String>
where
    F: FnOnce(&AppState) -> AnalyticsResult<T> + Send + 'static,
    T: Send + 'static,
{
    let request_id = uuid::Uuid::new_v4();
    let started = Instant::now();
    let worker = state.clone();
    let span = tracing::info_span!("operation", %request_id, op = name);
    let outcome = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        op(&worker)
    })
    .await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(Ok(value)) => {
            state.counters.record_success();
            tracing::info!(%request_id, op = name, elapsed_ms, "operation completed");
            Ok(value)
        }
        Ok(Err(e)) => {
            state.counters.record_failure();
            tracing::warn!(%request_id, op = name, error = %e, "operation failed");
            Err(e.to_string())
        }
        Err(join_err) => {
            state.counters.record_failure();
            tracing::error!(%request_id, op = name, error = %join_err, "operation aborted");
            Err(format!("internal error: {join_err}"))
        }
    }
}

fn failure(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

fn json_payload(result: Result<Value, String>) -> Response {
    match result {
        Ok(mut body) => {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("success".into(), Value::Bool(true));
            }
            Json(body).into_response()
        }
        Err(message) => failure(message),
    }
}

/// Parse the query, run one JSON operation behind the boundary.
async fn json_operation(
    state: Arc<AppState>,
    query: RawQuery,
    name: &'static str,
    op: fn(&AppState, &RequestParams) -> AnalyticsResult<Value>,
) -> Response {
    let raw = match query {
        Ok(Query(raw)) => raw,
        Err(rejection) => {
            state.counters.record_failure();
            tracing::warn!(op = name, error = %rejection, "bad query string");
            return failure(rejection.body_text());
        }
    };
    let params = RequestParams::from_raw(&raw, &state.config);
    tracing::debug!(op = name, groupby = %params.filter.group_by, "operation requested");
    json_payload(run_operation(state, name, move |s| op(s, &params)).await)
}

/// GET /api/pareto
pub async fn pareto(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "pareto", ops::pareto).await
}

/// GET /api/pareto/topn
pub async fn topn(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "topn", ops::topn).await
}

/// GET /api/pareto/abc
pub async fn abc(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "abc", ops::abc).await
}

/// GET /api/pareto/lorenz
pub async fn lorenz(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "lorenz", ops::lorenz).await
}

/// GET /api/pareto/scatter
pub async fn scatter(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "scatter", ops::scatter).await
}

/// GET /api/pareto/hist
pub async fn hist(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "hist", ops::hist).await
}

/// GET /api/pareto/treemap
pub async fn treemap(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "treemap", ops::treemap_op).await
}

/// GET /api/pareto/whatif
pub async fn whatif(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    json_operation(state, query, "whatif", ops::whatif).await
}

/// GET /api/pareto/export -- CSV attachment, JSON failure payload on error
pub async fn export(State(state): State<Arc<AppState>>, query: RawQuery) -> Response {
    let raw = match query {
        Ok(Query(raw)) => raw,
        Err(rejection) => {
            state.counters.record_failure();
            return failure(rejection.body_text());
        }
    };
    let params = RequestParams::from_raw(&raw, &state.config);
    let filename = format!("pareto_export_{}.csv", params.filter.group_by);

    match run_operation(state, "export", move |s| ops::export(s, &params)).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
            ],
            bytes,
        )
            .into_response(),
        Err(message) => failure(message),
    }
}

/// GET /api/overview -- store counts with fallback sources
pub async fn overview(State(state): State<Arc<AppState>>) -> Response {
    json_payload(run_operation(state, "overview", ops::overview).await)
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(json!({
        "requests_served": state.counters.requests_served.load(Relaxed),
        "requests_failed": state.counters.requests_failed.load(Relaxed),
        "rows_aggregated": state.counters.rows_aggregated.load(Relaxed),
        "exports_written": state.counters.exports_written.load(Relaxed),
    }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::report::read_csv;
    use crate::analytics::round2;
    use crate::config::AppConfig;
    use crate::db::fixtures::seeded_db;
    use crate::errors::AnalyticsError;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Arc<AppState> {
        AppState::new(AppConfig::default(), seeded_db())
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
        let router = crate::server::router(state.clone());
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn get_json(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let (status, bytes) = get(state, uri).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_pareto_route_success() {
        let state = app();
        let (status, v) = get_json(&state, "/api/pareto?threshold=70").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["idx_threshold"], json!(1));
    }

    #[tokio::test]
    async fn test_empty_filter_is_not_an_error() {
        let state = app();
        let (status, v) = get_json(&state, "/api/pareto/lorenz?search=nothing-matches").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["x"], json!([]));
        assert_eq!(v["gini"], json!(0.0));
        let (_, v) = get_json(&state, "/api/pareto?search=nothing-matches").await;
        assert_eq!(v["idx_threshold"], json!(-1));
        assert_eq!(v["sum_profit"], json!(0.0));
    }

    #[tokio::test]
    async fn test_bad_numbers_are_coerced() {
        let state = app();
        let (status, v) = get_json(&state, "/api/pareto/topn?n=lots").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["labels"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_huge_bin_count_is_served() {
        let state = app();
        let (status, v) = get_json(&state, "/api/pareto/hist?bins=100000000000").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["ppc"]["hist"].as_array().unwrap().len(), 10);
        assert_eq!(v["unit"]["edges"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_payload() {
        let state = app();
        state.db.lock().unwrap().execute_batch("DROP TABLE product_metric;").unwrap();
        let (status, v) = get_json(&state, "/api/pareto/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["success"], json!(false));
        assert!(v["error"].as_str().unwrap().contains("database error"));
        let (status, _) = get(&state, "/api/pareto/export").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        use portable_atomic::Ordering::Relaxed;
        assert_eq!(state.counters.requests_failed.load(Relaxed), 2);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let state = app();
        let result: Result<(), String> = run_operation(state.clone(), "boom", |_| -> AnalyticsResult<()> {
            panic!("worker blew up")
        })
        .await;
        assert!(result.unwrap_err().starts_with("internal error"));
        let result: Result<(), String> = run_operation(state, "fail", |_| {
            Err(AnalyticsError::Internal("nope".into()))
        })
        .await;
        assert_eq!(result.unwrap_err(), "internal error: nope");
    }

    #[tokio::test]
    async fn test_export_round_trips_with_pareto() {
        let state = app();
        let (_, pareto) = get_json(&state, "/api/pareto?groupby=name").await;
        let (status, csv) = get(&state, "/api/pareto/export?groupby=name").await;
        assert_eq!(status, StatusCode::OK);
        let rows = read_csv(csv.as_slice()).unwrap();
        assert_eq!(rows.len(), pareto["labels"].as_array().unwrap().len());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(json!(row.label), pareto["labels"][i]);
            assert_eq!(row.total_profit, round2(pareto["profit"][i].as_f64().unwrap()));
            assert_eq!(json!(row.cum_pct), pareto["cum_pct"][i]);
        }
    }

    #[tokio::test]
    async fn test_export_headers() {
        let state = app();
        let router = crate::server::router(state);
        let resp = router
            .oneshot(Request::builder().uri("/api/pareto/export?groupby=id").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = resp.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"pareto_export_id.csv\""
        );
    }

    #[tokio::test]
    async fn test_whatif_route_reports_params() {
        let state = app();
        let (_, v) = get_json(
            &state,
            "/api/pareto/whatif?price_delta_pct=10&sales_uplift_pct=0&selected=Salad",
        )
        .await;
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["params"]["selected"], json!(["Salad"]));
        assert_eq!(v["labels"][0], json!("Burger"));
    }

    #[tokio::test]
    async fn test_overview_and_counters() {
        let state = app();
        let (_, v) = get_json(&state, "/api/overview").await;
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["counts"][0]["name"], json!("metric_records"));
        assert_eq!(v["counts"][0]["value"], json!(4));
        let (_, c) = get_json(&state, "/api/counters").await;
        assert_eq!(c["requests_served"], json!(1));
        let (_, h) = get_json(&state, "/health").await;
        assert_eq!(h["status"], json!("ok"));
    }
}
