use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use trendcast_pipeline::{DetectionReport, ViralPrediction};

use crate::middleware::RequestId;

use super::{map_pipeline_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct PredictRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub category: String,
}

/// GET /api/v1/trends: active trends, highest score first.
pub(super) async fn list_trends(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<trendcast_core::Trend>>>, ApiError> {
    let trends = state
        .pipeline
        .list_trends()
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, trends))
}

/// POST /api/v1/trends/detect: run a detection pass now.
pub(super) async fn detect(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<DetectionReport>>, ApiError> {
    let report = state
        .pipeline
        .trigger_detection()
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, report))
}

/// POST /api/v1/trends/predict: score an article headline.
pub(super) async fn predict(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<ApiResponse<ViralPrediction>>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "title must not be empty",
        ));
    }
    let prediction =
        state
            .pipeline
            .predict_viral(&body.title, &body.description, &body.source, &body.category);
    Ok(ApiResponse::ok(&req_id, prediction))
}
