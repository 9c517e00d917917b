//! Settings API endpoints for managing the hot-reloadable configuration.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{AppState, RequestContext};
use crate::error::I18nError;

/// Response for GET /api/settings
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// All current settings (merged: defaults + DB overrides)
    pub settings: HashMap<String, serde_json::Value>,
    /// Which keys have DB overrides (vs using defaults)
    pub overridden: Vec<String>,
}

/// Request body for PUT /api/settings
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Settings to update (key -> value). Use null to delete/revert to default.
    pub settings: HashMap<String, serde_json::Value>,
}

/// GET /api/settings - retrieve all settings with their current values
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<SettingsResponse>, I18nError> {
    settings_response(&state, &ctx.locale).map(Json)
}

/// PUT /api/settings - update settings (triggers hot reload)
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, I18nError> {
    state
        .service
        .update_settings(request.settings)
        .map_err(|e| state.i18n_error(e, &ctx.locale))?;

    settings_response(&state, &ctx.locale).map(Json)
}

fn settings_response(state: &AppState, locale: &str) -> Result<SettingsResponse, I18nError> {
    // DB overrides tell which keys are explicitly set
    let db_settings = state
        .service
        .db
        .get_all_settings()
        .map_err(|e| state.i18n_error(e, locale))?;

    let mut overridden: Vec<String> = db_settings.into_keys().collect();
    overridden.sort();

    Ok(SettingsResponse {
        settings: state.service.runtime_config.dynamic().to_key_value_map(),
        overridden,
    })
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::test_support::{json_request, send};
    use crate::service::test_support::service_with;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_settings() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |d| d.cache.ttl_secs = 42));

        let (status, body) = send(
            router(service, None),
            Request::get("/api/settings").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["cache.ttl_secs"], 42);
        assert_eq!(body["overridden"], json!([]));
    }

    #[tokio::test]
    async fn test_update_settings() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));

        let (status, body) = send(
            router(service.clone(), None),
            json_request(
                "PUT",
                "/api/settings",
                json!({ "settings": { "history.retention_days": 7 } }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["history.retention_days"], 7);
        assert_eq!(body["overridden"], json!(["history.retention_days"]));
        assert_eq!(service.runtime_config.dynamic().history.retention_days, 7);
    }

    #[tokio::test]
    async fn test_update_settings_unknown_key() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));

        let (status, body) = send(
            router(service, None),
            json_request("PUT", "/api/settings", json!({ "settings": { "server.port": 1 } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_update_settings_wrong_type() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));

        let (status, body) = send(
            router(service.clone(), None),
            json_request(
                "PUT",
                "/api/settings",
                json!({ "settings": { "rate_limit.requests_per_minute": "abc" } }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");
        assert!(service.db.get_all_settings().unwrap().is_empty());
    }
}
