//! Capture and history handlers.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::capture::normalize::reconstruct_url;
use crate::capture::record::now_millis;
use crate::capture::{RawBody, RawRequest, RecordId, RequestRecord};
use crate::http::error::ApiResult;
use crate::http::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub message: String,
    pub request_id: RecordId,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub records: usize,
    pub subscribers: usize,
}

/// Capture any request under `/api/echo`.
pub async fn capture_request(
    State(state): State<AppState>,
    request: Request<Body>,
) -> ApiResult<Json<CaptureResponse>> {
    let received_at = now_millis();
    let (parts, body) = request.into_parts();
    let url = reconstruct_url(&parts.uri, &parts.headers, &state.config.listener.bind_address);

    let body = match axum::body::to_bytes(body, state.config.http.max_body_size).await {
        Ok(bytes) => RawBody::from_bytes(bytes),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Request body unreadable");
            RawBody::Unreadable
        }
    };

    let id = state
        .pipeline
        .capture(RawRequest {
            method: parts.method,
            url,
            headers: parts.headers,
            body,
            received_at,
        })
        .await?;

    Ok(Json(CaptureResponse {
        message: "Request captured".to_string(),
        request_id: id,
    }))
}

/// Most recent captures, newest first.
pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<RequestRecord>>> {
    let http = &state.config.http;
    let limit = params
        .limit
        .unwrap_or(http.default_history_limit)
        .min(http.max_history_limit);
    let offset = params.offset.unwrap_or(0);

    let records = state.pipeline.latest(limit, offset).await?;
    Ok(Json(records))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RequestRecord>> {
    let record = state.pipeline.get(&RecordId::from(id)).await?;
    Ok(Json(record))
}

pub async fn clear_requests(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.pipeline.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthStatus>> {
    let records = state.pipeline.count().await?;
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        records,
        subscribers: state.pipeline.hub().subscriber_count(),
    }))
}
