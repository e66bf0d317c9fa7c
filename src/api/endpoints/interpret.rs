use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::AppContext;
use crate::models::Interpretation;
use crate::pipeline::InterpretRequest;

/// `POST /ocr-local/parse-llm`: full interpretation of OCR text.
pub async fn parse_llm(
    State(ctx): State<AppContext>,
    payload: Result<Json<InterpretRequest>, JsonRejection>,
) -> Result<Json<Interpretation>, ApiError> {
    let Json(request) = payload?;
    if request.ocr_text.trim().is_empty() {
        return Err(ApiError::BadRequest("ocr_text is required".into()));
    }

    let interpretation = ctx.processor.interpret(request).await?;
    Ok(Json(interpretation))
}
