use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Text too short: {length} characters (min {min})")]
    TextTooShort { length: usize, min: usize },

    #[error("Text too long: {length} characters (max {max})")]
    TextTooLong { length: usize, max: usize },

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Result not found or expired: {hash}")]
    ResultNotFound { hash: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// LLM provider errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Connection to {provider} failed")]
    Connection {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} request timed out")]
    Timeout { provider: String },

    #[error("{provider} returned status {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{provider} blocked the request: {reason}")]
    Blocked { provider: String, reason: String },

    #[error("{provider} returned an empty completion")]
    EmptyResponse { provider: String },

    #[error("Invalid response from {provider}")]
    InvalidResponse {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No LLM provider is configured")]
    NoProviders,

    #[error("All {attempted} models failed; last error: {last_error}")]
    AllModelsFailed { attempted: usize, last_error: String },
}

impl LlmError {
    /// Whether another attempt against the same model may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Connection { .. } | LlmError::Timeout { .. } => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Server-provided delay before the next attempt, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            LlmError::Api {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Document processing errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("PDF library unavailable: {message}")]
    PdfiumUnavailable { message: String },

    #[error("Invalid or unreadable PDF: {message}")]
    InvalidPdf { message: String },

    #[error("No text could be extracted from the document")]
    NoText,

    #[error("OCR failed: {message}")]
    Ocr { message: String },

    #[error("PDF rendering failed: {message}")]
    Render { message: String },

    #[error("Unsupported file format: {format}")]
    UnsupportedFormat { format: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// API error response.
///
/// `erro` is the field the web front-end reads to display the failure.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub erro: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest { .. }
            | ServiceError::TextTooShort { .. }
            | ServiceError::TextTooLong { .. } => StatusCode::BAD_REQUEST,
            ServiceError::ResultNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Processing(ProcessingError::UnsupportedFormat { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Processing(
                ProcessingError::NoText | ProcessingError::InvalidPdf { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Llm(LlmError::NoProviders) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Llm(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Llm(LlmError::NoProviders) => "llm_not_configured",
            ServiceError::Llm(LlmError::AllModelsFailed { .. }) => "llm_unavailable",
            ServiceError::Llm(LlmError::Blocked { .. }) => "llm_blocked",
            ServiceError::Llm(_) => "llm_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Processing(ProcessingError::PdfiumUnavailable { .. }) => {
                "pdf_library_unavailable"
            }
            ServiceError::Processing(ProcessingError::InvalidPdf { .. }) => "invalid_pdf",
            ServiceError::Processing(ProcessingError::NoText) => "no_text_extracted",
            ServiceError::Processing(ProcessingError::Ocr { .. }) => "ocr_error",
            ServiceError::Processing(ProcessingError::Render { .. }) => "render_error",
            ServiceError::Processing(ProcessingError::UnsupportedFormat { .. }) => {
                "unsupported_format"
            }
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Processing(ProcessingError::Io(_)) => "io_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::TextTooShort { .. } => "text_too_short",
            ServiceError::TextTooLong { .. } => "text_too_long",
            ServiceError::RateLimited { .. } => "rate_limited",
            ServiceError::ResultNotFound { .. } => "result_not_found",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ServiceError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::InvalidRequest { message } => {
                i18n.format(locale, "error-invalid-request", &[("details", message)])
            }
            ServiceError::TextTooShort { min, .. } => {
                i18n.format(locale, "error-text-too-short", &[("min", &min.to_string())])
            }
            ServiceError::TextTooLong { max, .. } => {
                i18n.format(locale, "error-text-too-long", &[("max", &max.to_string())])
            }
            ServiceError::RateLimited { retry_after_secs } => i18n.format(
                locale,
                "error-rate-limit",
                &[("seconds", &retry_after_secs.to_string())],
            ),
            ServiceError::ResultNotFound { .. } => i18n.get(locale, "error-result-not-found", None),
            ServiceError::Processing(ProcessingError::FileTooLarge { max, .. }) => i18n.format(
                locale,
                "error-file-too-large",
                &[("max_mb", &(max / (1024 * 1024)).to_string())],
            ),
            ServiceError::Processing(ProcessingError::UnsupportedFormat { .. }) => {
                i18n.get(locale, "error-not-pdf", None)
            }
            ServiceError::Processing(ProcessingError::InvalidPdf { .. }) => {
                i18n.get(locale, "error-invalid-pdf", None)
            }
            ServiceError::Processing(ProcessingError::NoText) => {
                i18n.get(locale, "error-no-text", None)
            }
            ServiceError::Llm(LlmError::NoProviders) => {
                i18n.get(locale, "error-llm-not-configured", None)
            }
            ServiceError::Llm(_) => i18n.get(locale, "error-llm-unavailable", None),
            _ => i18n.get(locale, "error-internal", None),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after();

        let body = ErrorResponse {
            erro: self.user_message(i18n, locale),
            code: Some(self.error_code().to_string()),
            retry_after_secs: retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let i18n = I18n::new();
        let locale = i18n.default_locale().to_string();
        self.into_response_with_i18n(&i18n, &locale)
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        if self.error.status_code().is_server_error() {
            tracing::error!(
                code = self.error.error_code(),
                error = %format_error_chain(&self.error),
                "Request failed"
            );
        }
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
