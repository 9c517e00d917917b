//! HTTP API for the Linguagem Simples service.
//!
//! This module provides the endpoints for:
//! - PDF and text simplification, and the PDF download of a result
//! - Feedback collection
//! - Health and metrics monitoring
//! - Models, statistics, history and settings under `/api`

use axum::{
    Json, Router,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, State},
    http::{StatusCode, header, request::Parts},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{I18nError, ServiceError};
use crate::extraction::ocr::is_ocr_available;
use crate::llm::Provider;
use crate::rate_limit::client_key;
use crate::service::SimplifierService;

pub mod feedback;
pub mod settings;
pub mod simplify;
pub mod stats;
use feedback::feedback_handler;
use settings::{get_settings_handler, update_settings_handler};
use simplify::{download_pdf_handler, process_pdf_handler, process_text_handler};
use stats::{history_handler, models_handler, stats_handler};

/// Headroom for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<SimplifierService>,
    pub start_time: Instant,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError, locale: &str) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), locale)
    }
}

/// Per-request locale and client identity
pub struct RequestContext {
    /// Negotiated from `Accept-Language`
    pub locale: String,
    /// Rate limiting and last-result key
    pub client: String,
}

impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let accept_language = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        let locale = state.service.i18n.negotiate(accept_language);

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let trust_forwarded_for = state
            .service
            .runtime_config
            .dynamic()
            .rate_limit
            .trust_forwarded_for;
        let client = client_key(&parts.headers, peer, trust_forwarded_for);

        Ok(Self { locale, client })
    }
}

/// Build the API router
pub fn router(service: Arc<SimplifierService>, prometheus: Option<PrometheusHandle>) -> Router {
    let dynamic = service.runtime_config.snapshot();
    let static_dir = service.runtime_config.static_config.server.static_dir.clone();

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        prometheus,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The service re-checks the configured limit per request; this bounds the body read
    let max_body_size = (dynamic.limits.max_upload_bytes as usize).saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api_routes = Router::new()
        .route("/models", get(models_handler))
        .route("/stats", get(stats_handler))
        .route("/history", get(history_handler))
        .route(
            "/settings",
            get(get_settings_handler).put(update_settings_handler),
        );

    let mut router = Router::new()
        .route(
            "/processar",
            post(process_pdf_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/processar_texto", post(process_text_handler))
        .route("/download_pdf", get(download_pdf_handler))
        .route("/feedback", post(feedback_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes);

    if let Some(dir) = static_dir {
        info!(dir = %dir.display(), "Serving static files");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TimeoutLayer::new(dynamic.llm.overall_timeout()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Json<HealthResponse> {
    let providers = state.service.llm.configured_providers();
    let ocr_available = tokio::task::spawn_blocking(is_ocr_available)
        .await
        .unwrap_or(false);

    let i18n = &state.service.i18n;
    let status = if providers.is_empty() {
        let reason = i18n.get(&ctx.locale, "health-no-providers", None);
        i18n.format(&ctx.locale, "health-status-degraded", &[("reason", &reason)])
    } else {
        i18n.get(&ctx.locale, "health-status-healthy", None)
    };

    Json(HealthResponse {
        healthy: !providers.is_empty(),
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        providers,
        ocr_available,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    status: String,
    version: String,
    uptime_seconds: u64,
    providers: Vec<Provider>,
    ocr_available: bool,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{json_request, send};
    use super::*;
    use crate::llm::test_support::spawn_mock;
    use crate::service::test_support::service_with;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_configured_providers() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));
        let request = Request::get("/health").body(Body::empty()).unwrap();

        let (status, body) = send(router(service, None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["providers"], serde_json::json!(["openai"]));
        assert_eq!(body["status"], "Serviço operando normalmente");
    }

    #[tokio::test]
    async fn test_health_is_localized() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));
        let request = Request::get("/health")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.8")
            .body(Body::empty())
            .unwrap();

        let (_, body) = send(router(service, None), request).await;
        assert_eq!(body["status"], "Service is healthy");
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_empty() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));
        let response = router(service, None)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    fn text_request_from(peer: SocketAddr, forwarded_for: &str) -> Request<Body> {
        let mut request = json_request(
            "POST",
            "/processar_texto",
            serde_json::json!({ "texto": "Julgo procedente o pedido formulado pelo autor." }),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded_for.parse().unwrap());
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_by_default() {
        let base = spawn_mock(Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Você ganhou." } }]
                }))
            }),
        ))
        .await;
        let service = Arc::new(service_with(&base, |d| d.rate_limit.requests_per_minute = 1));
        let peer: SocketAddr = "198.51.100.20:40000".parse().unwrap();

        let (status, _) = send(router(service.clone(), None), text_request_from(peer, "1.2.3.4")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(router(service.clone(), None), text_request_from(peer, "5.6.7.8")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "rate_limited");
        assert_eq!(service.rate_limiter.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn test_unknown_route_without_static_dir() {
        let service = Arc::new(service_with("http://127.0.0.1:9", |_| {}));
        let response = router(service, None)
            .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
