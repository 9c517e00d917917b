//! Feedback endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{AppState, RequestContext};
use crate::error::{I18nError, ServiceError};

/// Request body for POST /feedback
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
    /// Hash of the rated result, from `SimplificationResponse::hash`
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub sucesso: bool,
    pub mensagem: String,
}

/// POST /feedback - rate a simplification
pub async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, I18nError> {
    let Json(request) = body.map_err(|e| {
        state.i18n_error(
            ServiceError::InvalidRequest {
                message: e.body_text(),
            },
            &ctx.locale,
        )
    })?;

    let mensagem = state
        .service
        .submit_feedback(request.rating, request.comment, request.hash, &ctx.locale)
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;

    Ok(Json(FeedbackResponse {
        sucesso: true,
        mensagem,
    }))
}
