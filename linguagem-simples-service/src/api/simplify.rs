//! Simplification endpoints used by the web front-end.

use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::api::{AppState, RequestContext};
use crate::error::{I18nError, ProcessingError, ServiceError};
use crate::service::SimplificationResponse;

/// Multipart field carrying the PDF
const FILE_FIELD: &str = "file";

/// Request body for POST /processar_texto
#[derive(Debug, Deserialize)]
pub struct ProcessTextRequest {
    pub texto: String,
}

/// Query string for GET /download_pdf
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub hash: Option<String>,
}

/// POST /processar - simplify an uploaded PDF
pub async fn process_pdf_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    mut multipart: Multipart,
) -> Result<Json<SimplificationResponse>, I18nError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.i18n_error(multipart_error(&state, e), &ctx.locale))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("documento.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| state.i18n_error(multipart_error(&state, e), &ctx.locale))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(state.i18n_error(
            ServiceError::InvalidRequest {
                message: format!("missing '{}' field", FILE_FIELD),
            },
            &ctx.locale,
        ));
    };

    debug!(filename = %filename, size = bytes.len(), client = %ctx.client, "PDF upload received");

    let response = state
        .service
        .simplify_pdf(bytes.to_vec(), &filename, &ctx.client)
        .await
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;

    Ok(Json(response))
}

fn multipart_error(state: &AppState, error: axum::extract::multipart::MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let max = state.service.runtime_config.dynamic().limits.max_upload_bytes;
        ProcessingError::FileTooLarge {
            size: max.saturating_add(1),
            max,
        }
        .into()
    } else {
        ServiceError::InvalidRequest {
            message: error.body_text(),
        }
    }
}

/// POST /processar_texto - simplify pasted text
pub async fn process_text_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    body: Result<Json<ProcessTextRequest>, JsonRejection>,
) -> Result<Json<SimplificationResponse>, I18nError> {
    let Json(request) = body.map_err(|e| {
        state.i18n_error(
            ServiceError::InvalidRequest {
                message: e.body_text(),
            },
            &ctx.locale,
        )
    })?;

    let response = state
        .service
        .simplify_text(&request.texto, &ctx.client)
        .await
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;

    Ok(Json(response))
}

/// GET /download_pdf - the simplified text as a PDF attachment
pub async fn download_pdf_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<impl IntoResponse, I18nError> {
    let Query(query) = query.map_err(|e| {
        state.i18n_error(
            ServiceError::InvalidRequest {
                message: e.body_text(),
            },
            &ctx.locale,
        )
    })?;

    let (filename, bytes) = state
        .service
        .pdf_for(query.hash.as_deref(), &ctx.client, &ctx.locale)
        .await
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}
