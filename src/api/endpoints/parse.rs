use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::AppContext;
use crate::pipeline::extraction::ParsedReport;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

/// `POST /ocr/parse`: deterministic parse only, no model calls.
pub async fn parse(
    State(ctx): State<AppContext>,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<ParsedReport>, ApiError> {
    let Json(request) = payload?;
    let report = ctx.processor.parse(&request.text);
    tracing::debug!(results = report.lab_results.len(), "Deterministic parse served");
    Ok(Json(report))
}
