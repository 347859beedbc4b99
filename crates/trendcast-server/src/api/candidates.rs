//! Candidate review handlers: generate, list, approve, reject, edit.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use trendcast_core::{CandidateEdit, CandidateStatus, ContentCandidate, ContentStats};

use crate::middleware::RequestId;

use super::{map_pipeline_error, ApiError, ApiResponse, AppState};

const DEFAULT_BATCH: usize = 6;

#[derive(Debug, Default, Deserialize)]
pub(super) struct GenerateRequest {
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    pub status: Option<String>,
}

/// POST /api/v1/trends/{id}/candidates: generate a candidate batch.
pub(super) async fn generate_candidates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(trend_id): Path<i64>,
    Json(body): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ContentCandidate>>>), ApiError> {
    let count = body.count.unwrap_or(DEFAULT_BATCH);
    let created = state
        .pipeline
        .generate_candidates(trend_id, count)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::ok(&req_id, created)))
}

/// GET /api/v1/trends/{id}/candidates?status=suggested
pub(super) async fn list_candidates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(trend_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ContentCandidate>>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<CandidateStatus>)
        .transpose()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;
    let candidates = state
        .pipeline
        .list_candidates(trend_id, status)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, candidates))
}

pub(super) async fn approve(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ContentCandidate>>, ApiError> {
    let candidate = state
        .pipeline
        .approve(id)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, candidate))
}

pub(super) async fn reject(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ContentCandidate>>, ApiError> {
    let candidate = state
        .pipeline
        .reject(id)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, candidate))
}

/// PATCH /api/v1/candidates/{id}: edit title, body, hashtags or posting time.
pub(super) async fn edit_candidate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(edit): Json<CandidateEdit>,
) -> Result<Json<ApiResponse<ContentCandidate>>, ApiError> {
    let candidate = state
        .pipeline
        .edit_candidate(id, &edit)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, candidate))
}

pub(super) async fn content_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ContentStats>>, ApiError> {
    let stats = state
        .pipeline
        .content_stats()
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, stats))
}
