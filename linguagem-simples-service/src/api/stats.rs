//! Model chain and usage statistics endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{AppState, RequestContext};
use crate::db::HistoryRecord;
use crate::error::I18nError;
use crate::llm::ModelStatus;
use crate::service::ServiceStats;

/// GET /api/models - the configured fallback chain
pub async fn models_handler(State(state): State<Arc<AppState>>) -> Json<Vec<ModelStatus>> {
    Json(state.service.llm.available_models())
}

/// GET /api/stats - processing, feedback and cache statistics
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<ServiceStats>, I18nError> {
    let stats = state
        .service
        .stats()
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;
    Ok(Json(stats))
}

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

/// Query string for GET /api/history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /api/history - most recent processing runs, newest first
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>, I18nError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let records = state
        .service
        .db
        .recent_history(limit)
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;
    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::test_support::send;
    use crate::llm::test_support::spawn_mock;
    use crate::service::test_support::service_with;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::{Json, Router, routing::post};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_models_endpoint() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |d| {
            d.llm.models = vec![
                "gemini:gemini-2.0-flash".to_string(),
                "openai:gpt-4o-mini".to_string(),
            ];
        }));

        let (status, body) = send(
            router(service, None),
            Request::get("/api/models").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["provider"], "gemini");
        assert_eq!(body[0]["configured"], false);
        assert_eq!(body[1]["model"], "gpt-4o-mini");
        assert_eq!(body[1]["configured"], true);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));
        service.submit_feedback(5, None, None, "pt-BR").unwrap();

        let (status, body) = send(
            router(service, None),
            Request::get("/api/stats").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processing"]["total_requests"], 0);
        assert_eq!(body["feedback"]["total"], 1);
        assert_eq!(body["cache"]["entries"], 0);
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let base = spawn_mock(Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Resumo." } }]
                }))
            }),
        ))
        .await;
        let service = Arc::new(service_with(&base, |_| {}));
        for _ in 0..3 {
            service
                .simplify_text("Julgo parcialmente procedente o pedido do autor.", "c")
                .await
                .unwrap();
        }

        let (status, body) = send(
            router(service, None),
            Request::get("/api/history?limit=2").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["source"], "text");
        assert_eq!(rows[0]["model"], "gpt-4o-mini");
    }
}
