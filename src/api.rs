// src/api.rs
//! Read-only HTTP API over the stored delegations.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::SecondsFormat;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::delegation::Delegation;
use crate::store::DelegationReader;

pub const DELEGATIONS_ROUTE: &str = "/xtz/delegations";

/// Upper bound on producing a response; slower requests get a bare 408.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").expect("year regex"));

#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<dyn DelegationReader>,
}

impl AppState {
    pub fn new<R: DelegationReader + 'static>(reader: R) -> Self {
        Self {
            reader: Arc::new(reader),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // `any` so that HEAD, OPTIONS and friends get a bare 405 instead of
        // axum's implicit HEAD handling
        .route(DELEGATIONS_ROUTE, any(list_delegations))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidYear;

/// `None`/empty means "no filter"; anything else must be exactly four digits.
pub fn parse_year(raw: Option<&str>) -> Result<Option<i32>, InvalidYear> {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if !RE_YEAR.is_match(raw) {
        return Err(InvalidYear);
    }
    raw.parse::<i32>().map(Some).map_err(|_| InvalidYear)
}

/// First value of a repeated query key; later duplicates are ignored.
fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[derive(serde::Serialize)]
struct DelegationOut {
    timestamp: String,
    amount: String,
    delegator: String,
    level: String,
}

impl From<Delegation> for DelegationOut {
    fn from(d: Delegation) -> Self {
        Self {
            timestamp: d.block_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            amount: d.amount.to_string(),
            delegator: d.sender,
            level: d.level.to_string(),
        }
    }
}

#[derive(serde::Serialize)]
struct DelegationsResp {
    data: Vec<DelegationOut>,
}

async fn list_delegations(
    method: Method,
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    if method != Method::GET {
        record(StatusCode::METHOD_NOT_ALLOWED);
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")]).into_response();
    }

    let year = match query
        .map_err(|_| InvalidYear)
        .and_then(|Query(pairs)| parse_year(first_value(&pairs, "year")))
    {
        Ok(year) => year,
        Err(InvalidYear) => {
            record(StatusCode::BAD_REQUEST);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.reader.list_delegations(year).await {
        Ok(rows) => {
            record(StatusCode::OK);
            let data = rows.into_iter().map(DelegationOut::from).collect();
            (StatusCode::OK, Json(DelegationsResp { data })).into_response()
        }
        Err(e) => {
            // logged server-side only; the client gets a bare 500
            tracing::error!(error = ?e, ?year, "listing delegations failed");
            record(StatusCode::INTERNAL_SERVER_ERROR);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn record(status: StatusCode) {
    counter!("api_requests_total", "status" => status.as_u16().to_string()).increment(1);
}
