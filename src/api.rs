//! HTTP API for the walker payout engine.
//!
//! This module exposes the payout lookup as a small JSON service using
//! the [`axum`](https://crates.io/crates/axum) framework.  Browsers call
//! it directly from the walker portal, so every response carries
//! permissive CORS headers and a JSON content type.  Failures are
//! reported as `{"error": "..."}` with status 200; the portal only looks
//! at the body.

use crate::billing::{cycle_containing, generate_billing_cycles, CycleWindow};
use crate::config::Config;
use crate::engine::{parse_numeric_cell, resolve_payout_with, ResolveOptions};
use crate::error::{LookupError, SheetError};
use crate::models::{BillingCycle, CellValue, PayoutRecord};
use crate::sheets::{GoogleSheetsCsvSource, SpreadsheetSource};
use crate::tds::{FlatTds, TdsAssessment, TdsCalculator};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

/// Application state shared across requests.
pub struct AppState {
    pub source: Arc<dyn SpreadsheetSource>,
    pub options: ResolveOptions,
    pub default_sheet_id: u64,
    pub tds: Arc<dyn TdsCalculator>,
}

impl AppState {
    pub fn new(source: Arc<dyn SpreadsheetSource>) -> Self {
        Self {
            source,
            options: ResolveOptions::default(),
            default_sheet_id: 0,
            tds: Arc::new(FlatTds::default()),
        }
    }

    /// State backed by the Google Sheets CSV export.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = GoogleSheetsCsvSource::new(&config.sheets_base_url, config.sheets_timeout)
            .context("could not set up the sheet export client")?;
        Ok(Self {
            options: config.resolve_options(),
            default_sheet_id: config.default_sheet_id,
            ..Self::new(Arc::new(source))
        })
    }
}

/// Everything that can end a request with an `{"error"}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required parameters: spreadsheetId and feid are required")]
    MissingParameters,
    #[error("Sheet not found")]
    InvalidSheetId,
    #[error("Invalid year '{0}'")]
    InvalidYear(String),
    #[error("{0}")]
    InvalidWindow(String),
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_response(&ErrorBody {
            error: self.to_string(),
        })
    }
}

fn json_response<T: Serialize>(body: &T) -> Response {
    (StatusCode::OK, CORS_HEADERS, Json(body)).into_response()
}

/// Query string as `(key, value)` pairs in arrival order.  Keys may
/// repeat; the first occurrence of a key is the one that counts.
type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

fn query_pairs(params: QueryPairs) -> Result<Vec<(String, String)>, ApiError> {
    match params {
        Ok(Query(pairs)) => Ok(pairs),
        Err(rejection) => {
            let reason = rejection.body_text();
            warn!(error = %reason, "unreadable query string");
            Err(ApiError::InvalidQuery(reason))
        }
    }
}

fn first_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

/// Query parameters of a payout lookup.  Everything arrives as text so
/// a malformed value becomes an `{"error"}` body rather than a 400.
#[derive(Debug, Default)]
pub struct PayoutQuery {
    pub spreadsheet_id: Option<String>,
    pub feid: Option<String>,
    pub sheet_id: Option<String>,
}

impl PayoutQuery {
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            spreadsheet_id: first_value(pairs, "spreadsheetId"),
            feid: first_value(pairs, "feid"),
            sheet_id: first_value(pairs, "sheetId"),
        }
    }
}

#[derive(Debug, Default)]
pub struct TdsQuery {
    /// Earnings earlier in the financial year; defaults to 0.
    pub fy_earnings: Option<String>,
}

impl TdsQuery {
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            fy_earnings: first_value(pairs, "fyEarnings"),
        }
    }
}

#[derive(Debug, Default)]
pub struct BillingQuery {
    pub year: Option<String>,
    pub window: Option<String>,
}

impl BillingQuery {
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            year: first_value(pairs, "year"),
            window: first_value(pairs, "window"),
        }
    }
}

#[derive(Debug, Serialize)]
struct TdsResponse {
    #[serde(flatten)]
    record: PayoutRecord,
    #[serde(flatten)]
    tds: TdsAssessment,
}

/// Build the API router around the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            get(payout_handler).post(payout_handler).options(preflight),
        )
        .route(
            "/payout",
            get(payout_handler).post(payout_handler).options(preflight),
        )
        .route(
            "/tds",
            get(tds_handler).post(tds_handler).options(preflight),
        )
        .route("/billing-cycles", get(billing_handler).options(preflight))
        .with_state(state)
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        CORS_HEADERS,
        [(header::CONTENT_TYPE, "application/json")],
    )
}

/// Handler for GET|POST / and /payout
async fn payout_handler(State(state): State<Arc<AppState>>, params: QueryPairs) -> Response {
    let pairs = match query_pairs(params) {
        Ok(pairs) => pairs,
        Err(err) => return err.into_response(),
    };
    match lookup(&state, &PayoutQuery::from_pairs(&pairs)).await {
        Ok(record) => json_response(&record),
        Err(err) => err.into_response(),
    }
}

/// Handler for GET|POST /tds
async fn tds_handler(State(state): State<Arc<AppState>>, params: QueryPairs) -> Response {
    let pairs = match query_pairs(params) {
        Ok(pairs) => pairs,
        Err(err) => return err.into_response(),
    };
    let fy_earnings = TdsQuery::from_pairs(&pairs)
        .fy_earnings
        .map(|raw| parse_numeric_cell(&CellValue::from(raw)))
        .unwrap_or(0.0);
    match lookup(&state, &PayoutQuery::from_pairs(&pairs)).await {
        Ok(record) => {
            let tds = state.tds.assess(&record, fy_earnings);
            json_response(&TdsResponse { record, tds })
        }
        Err(err) => err.into_response(),
    }
}

/// Handler for GET /billing-cycles
async fn billing_handler(params: QueryPairs) -> Response {
    let result =
        query_pairs(params).and_then(|pairs| billing_cycles(&BillingQuery::from_pairs(&pairs)));
    match result {
        Ok(cycles) => json_response(&cycles),
        Err(err) => err.into_response(),
    }
}

fn billing_cycles(query: &BillingQuery) -> Result<Vec<BillingCycle>, ApiError> {
    let year = match non_empty(&query.year) {
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| ApiError::InvalidYear(raw.to_string()))?,
        None => current_cycle_year(),
    };
    let window = match non_empty(&query.window) {
        Some(raw) => raw.parse::<CycleWindow>().map_err(ApiError::InvalidWindow)?,
        None => CycleWindow::default(),
    };
    Ok(generate_billing_cycles(year, window))
}

/// Year of the cycle today is settled in, so late December already
/// offers next year's cycles.
fn current_cycle_year() -> i32 {
    let today = Utc::now().date_naive();
    cycle_containing(today)
        .end_date()
        .map(|d| d.year())
        .unwrap_or_else(|| today.year())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn lookup(state: &AppState, query: &PayoutQuery) -> Result<PayoutRecord, ApiError> {
    let (Some(spreadsheet_id), Some(feid)) = (non_empty(&query.spreadsheet_id), non_empty(&query.feid))
    else {
        return Err(ApiError::MissingParameters);
    };
    let sheet_id = match non_empty(&query.sheet_id) {
        Some(raw) => raw.parse::<u64>().map_err(|_| ApiError::InvalidSheetId)?,
        None => state.default_sheet_id,
    };
    info!(spreadsheet_id, feid, sheet_id, "payout lookup");

    let snapshot = state.source.snapshot(spreadsheet_id, sheet_id).await.map_err(|e| {
        warn!(spreadsheet_id, sheet_id, error = %e, "could not read sheet");
        e
    })?;
    let resolution = resolve_payout_with(&snapshot, feid, &state.options).map_err(|e| {
        info!(feid, error = %e, "payout lookup failed");
        e
    })?;
    Ok(resolution.record)
}

/// Launch the API server.  Binds to the configured address and serves
/// until the process is interrupted.
pub async fn serve(config: &Config) -> Result<()> {
    let router = build_router(Arc::new(AppState::from_config(config)?));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("could not bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, router).await.context("server terminated")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DuplicatePolicy;
    use crate::models::SpreadsheetSnapshot;
    use crate::sheets::InMemorySource;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router_with(options: ResolveOptions) -> Router {
        let snapshot = SpreadsheetSnapshot::from_text_rows(vec![
            vec!["FEID", "Base Pay", "Walker Cancellation"],
            vec!["FE94469", "1000", "50"],
            vec!["FE10", "31,000", ""],
            vec!["FE10", "5", ""],
        ]);
        let source = InMemorySource::new().with_sheet("book", 0, snapshot);
        let state = AppState {
            options,
            ..AppState::new(Arc::new(source))
        };
        build_router(Arc::new(state))
    }

    async fn call(router: Router, method: Method, uri: &str) -> (Response, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (Response::from_parts(parts, Body::empty()), value)
    }

    fn assert_cors_json(response: &Response) {
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn payout_lookup_returns_record() {
        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/?spreadsheetId=book&feid=FE94469",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(
            body,
            json!({
                "feid": "FE94469",
                "basePayout": 1000.0,
                "otPayout": 0.0,
                "walkerOrderFulfilment": 0.0,
                "onTimeLogin": 0.0,
                "bestRankedStationReward": 0.0,
                "festiveIncentives": 0.0,
                "cancellationAmount": 50.0,
                "walkerLateLogin": 0.0,
                "totalPayout": 950.0
            })
        );
    }

    #[tokio::test]
    async fn post_is_treated_like_get() {
        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::POST,
            "/payout?spreadsheetId=book&feid=FE94469&sheetId=0",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(body["totalPayout"], 950.0);
    }

    #[tokio::test]
    async fn errors_are_json_with_status_200() {
        let cases = [
            ("/?feid=FE94469", "Missing required parameters: spreadsheetId and feid are required"),
            ("/?spreadsheetId=book&feid=", "Missing required parameters: spreadsheetId and feid are required"),
            ("/?spreadsheetId=book&feid=FE1", "FEID not found"),
            ("/?spreadsheetId=book&feid=FE94469&sheetId=3", "Sheet not found"),
            ("/?spreadsheetId=book&feid=FE94469&sheetId=abc", "Sheet not found"),
            ("/?spreadsheetId=other&feid=FE94469", "Sheet not found"),
        ];
        for (uri, message) in cases {
            let (response, body) =
                call(router_with(ResolveOptions::default()), Method::GET, uri).await;
            assert_cors_json(&response);
            assert_eq!(body, json!({ "error": message }), "{}", uri);
        }
    }

    #[tokio::test]
    async fn repeated_query_keys_keep_the_first_value() {
        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/?spreadsheetId=book&feid=FE94469&feid=FE94469&feid=FE10&spreadsheetId=other",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(body["feid"], "FE94469");
        assert_eq!(body["totalPayout"], 950.0);

        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/tds?spreadsheetId=book&feid=FE94469&fyEarnings=200000&fyEarnings=0",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(body["tdsApplicable"], true);

        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/billing-cycles?year=2025&year=1999&window=all&window=weekly",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(body.as_array().unwrap().len(), 12);
        assert_eq!(body[0]["endDateISO"], "2025-01-20");
    }

    #[tokio::test]
    async fn malformed_escapes_still_get_json() {
        let cases = [
            "/?spreadsheetId=book&feid=%ZZ",
            "/?spreadsheetId=book&feid=%FF%FE",
            "/tds?spreadsheetId=book&feid=FE%",
        ];
        for uri in cases {
            let (response, body) =
                call(router_with(ResolveOptions::default()), Method::GET, uri).await;
            assert_cors_json(&response);
            assert_eq!(body, json!({ "error": "FEID not found" }), "{}", uri);
        }
    }

    #[test]
    fn from_config_rejects_unusable_sheet_url() {
        let config = Config {
            sheets_base_url: "sheets.example/d".to_string(),
            ..Config::default()
        };
        assert!(AppState::from_config(&config).is_err());
        assert!(AppState::from_config(&Config::default()).is_ok());
    }

    #[test]
    fn query_rejections_become_error_bodies() {
        let err = ApiError::InvalidQuery("bad pair".to_string());
        assert_eq!(err.to_string(), "Invalid query string: bad pair");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn duplicate_policy_comes_from_state() {
        let (_, lenient) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/?spreadsheetId=book&feid=FE10",
        )
        .await;
        assert_eq!(lenient["basePayout"], 31000.0);

        let strict = ResolveOptions {
            duplicates: DuplicatePolicy::Reject,
            ..Default::default()
        };
        let (_, rejected) = call(
            router_with(strict),
            Method::GET,
            "/?spreadsheetId=book&feid=FE10",
        )
        .await;
        assert_eq!(rejected["error"], "FEID appears in more than one row: [3, 4]");
    }

    #[tokio::test]
    async fn tds_endpoint_adds_assessment() {
        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/tds?spreadsheetId=book&feid=FE10",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(body["totalPayout"], 31000.0);
        assert_eq!(body["tdsApplicable"], true);
        assert!((body["tdsAmount"].as_f64().unwrap() - 3100.0).abs() < 1e-9);

        let (_, small) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/tds?spreadsheetId=book&feid=FE94469&fyEarnings=%E2%82%B91%2C000",
        )
        .await;
        assert_eq!(small["tdsApplicable"], false);
        assert_eq!(small["salaryAfterTds"], 1000.0);
    }

    #[tokio::test]
    async fn billing_cycles_by_window() {
        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/billing-cycles?year=2025&window=all",
        )
        .await;
        assert_cors_json(&response);
        let cycles = body.as_array().unwrap();
        assert_eq!(cycles.len(), 12);
        assert_eq!(
            cycles[0],
            json!({
                "label": "January 2025 (21 Dec - 20 Jan)",
                "startDateISO": "2024-12-21",
                "endDateISO": "2025-01-20",
                "monthIndex": 0
            })
        );

        let (_, recent) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/billing-cycles?year=2025",
        )
        .await;
        assert_eq!(recent.as_array().unwrap().len(), 5);
        assert_eq!(recent[0]["monthIndex"], 7);

        let (_, bad) = call(
            router_with(ResolveOptions::default()),
            Method::GET,
            "/billing-cycles?year=2025&window=weekly",
        )
        .await;
        assert_eq!(bad["error"], "Unknown billing cycle window 'weekly'");
    }

    #[tokio::test]
    async fn preflight_carries_cors_headers() {
        let (response, body) = call(
            router_with(ResolveOptions::default()),
            Method::OPTIONS,
            "/payout",
        )
        .await;
        assert_cors_json(&response);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
        assert_eq!(body, Value::Null);
    }
}
