//! Admin HTTP surface: health, the current schedule, and ad-hoc job triggers.
//!
//! Job triggers only validate and enqueue. The job itself runs on a spawned
//! task and reports through its summary log line, like scheduled runs do.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use pricewatch_core::{ScheduleTable, MAX_STALE_DAYS};
use pricewatch_ingest::Ingestor;
use pricewatch_scraper::Site;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::{request_id, RequestId};
use crate::scheduler::ScheduleRx;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub schedule: ScheduleRx,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" | "unsupported_site" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    schedule_entries: usize,
    schedule_built_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    pub site: String,
    pub term: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub site: String,
    #[serde(default)]
    pub stale_days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct JobAccepted {
    kind: &'static str,
    site: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stale_days: Option<i64>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schedule", get(schedule))
        .route("/jobs/crawl", post(trigger_crawl))
        .route("/jobs/refresh", post(trigger_refresh))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let table = current(&state);
    Json(ApiResponse {
        data: HealthData {
            status: "ok",
            schedule_entries: table.len(),
            schedule_built_at: table.built_at,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

async fn schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(ApiResponse {
        data: current(&state),
        meta: ResponseMeta::new(req_id.0),
    })
}

fn current(state: &AppState) -> Arc<ScheduleTable> {
    Arc::clone(&state.schedule.borrow())
}

fn parse_site(request_id: &str, raw: &str) -> Result<Site, ApiError> {
    raw.parse::<Site>()
        .map_err(|e| ApiError::new(request_id, "unsupported_site", e.to_string()))
}

async fn trigger_crawl(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CrawlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = parse_site(&req_id.0, &body.site)?;
    let term = body.term.trim().to_owned();
    if term.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "term must not be empty",
        ));
    }

    let ingestor = state.ingestor.clone();
    let job_term = term.clone();
    tokio::spawn(async move {
        if let Err(e) = ingestor.crawl(site.key(), &job_term).await {
            tracing::error!(site = site.key(), term = %job_term, error = %e, "ad-hoc crawl failed");
        }
    });
    tracing::info!(request_id = %req_id.0, site = site.key(), term = %term, "crawl job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: JobAccepted {
                kind: "crawl",
                site: site.key(),
                term: Some(term),
                stale_days: None,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

async fn trigger_refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = parse_site(&req_id.0, &body.site)?;
    if body
        .stale_days
        .is_some_and(|d| !(0..=MAX_STALE_DAYS).contains(&d))
    {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("stale_days must be between 0 and {MAX_STALE_DAYS}"),
        ));
    }
    let stale_days = body
        .stale_days
        .unwrap_or(state.ingestor.settings().stale_days);

    let ingestor = state.ingestor.clone();
    tokio::spawn(async move {
        if let Err(e) = ingestor.refresh_stale(site.key(), stale_days).await {
            tracing::error!(site = site.key(), error = %e, "ad-hoc refresh failed");
        }
    });
    tracing::info!(request_id = %req_id.0, site = site.key(), stale_days, "refresh job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: JobAccepted {
                kind: "refresh",
                site: site.key(),
                term: None,
                stale_days: Some(stale_days),
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
