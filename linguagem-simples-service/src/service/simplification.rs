//! PDF and pasted-text simplification, plus the PDF download of a result.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{Analysis, analyze, reduction_percent};
use crate::cache::CachedSimplification;
use crate::db::{HistoryRecord, ProcessingSource};
use crate::error::{ProcessingError, ServiceError, ServiceResult, format_error_chain};
use crate::extraction::hash::is_content_hash;
use crate::extraction::{
    ExtractedDocument, compute_content_hash, extract_document, looks_like_pdf, normalize_text,
    truncate_chars,
};
use crate::llm::prompts::{SYSTEM_PROMPT, build_simplification_prompt};
use crate::render::{RenderOptions, render_pdf};
use crate::service::SimplifierService;

/// Attachment name of the downloaded PDF
pub const PDF_FILENAME: &str = "documento_simplificado.pdf";

/// JSON body returned by `/processar` and `/processar_texto`
#[derive(Debug, Clone, Serialize)]
pub struct SimplificationResponse {
    pub texto: String,
    pub analise: Analysis,
    pub modelo_usado: String,
    pub provedor: String,
    pub caracteres_original: usize,
    pub caracteres_simplificado: usize,
    pub reducao_percentual: f64,
    pub hash: String,
    pub download_url: String,
    pub em_cache: bool,
    pub ocr: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paginas: Option<usize>,
    pub truncado: bool,
}

/// Validated input, ready for the LLM
struct PreparedInput {
    text: String,
    source: ProcessingSource,
    used_ocr: bool,
    pages: Option<usize>,
}

fn record_failure(error: &ServiceError) {
    metrics::counter!("simplify_failures_total", "reason" => error.error_code()).increment(1);
}

fn join_error(e: tokio::task::JoinError) -> ServiceError {
    ServiceError::Internal {
        message: format!("Blocking task failed: {}", e),
    }
}

impl SimplifierService {
    /// Simplify an uploaded PDF.
    pub async fn simplify_pdf(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        client: &str,
    ) -> ServiceResult<SimplificationResponse> {
        metrics::counter!("simplify_requests_total", "source" => "pdf").increment(1);
        let started = Instant::now();

        let result = async {
            let input = self.prepare_pdf(bytes, filename, client).await?;
            self.simplify_prepared(input, client, started).await
        }
        .await;

        result.inspect_err(record_failure)
    }

    /// Simplify pasted text.
    pub async fn simplify_text(&self, text: &str, client: &str) -> ServiceResult<SimplificationResponse> {
        metrics::counter!("simplify_requests_total", "source" => "text").increment(1);
        let started = Instant::now();

        let result = async {
            let input = self.prepare_text(text, client)?;
            self.simplify_prepared(input, client, started).await
        }
        .await;

        result.inspect_err(record_failure)
    }

    async fn prepare_pdf(&self, bytes: Vec<u8>, filename: &str, client: &str) -> ServiceResult<PreparedInput> {
        let dynamic = self.runtime_config.snapshot();

        let max_size = dynamic.limits.max_upload_bytes;
        if bytes.len() as u64 > max_size {
            return Err(ProcessingError::FileTooLarge {
                size: bytes.len() as u64,
                max: max_size,
            }
            .into());
        }

        if bytes.is_empty() || !looks_like_pdf(&bytes) {
            let format = filename
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_lowercase())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ProcessingError::UnsupportedFormat { format }.into());
        }

        self.check_rate_limit(client)?;

        info!(filename = %filename, size = bytes.len(), "Extracting PDF text");

        let ocr = dynamic.ocr.clone();
        let ExtractedDocument {
            text,
            pages,
            used_ocr,
        } = tokio::task::spawn_blocking(move || extract_document(&bytes, &ocr))
            .await
            .map_err(join_error)??;

        Ok(PreparedInput {
            text,
            source: ProcessingSource::Pdf,
            used_ocr,
            pages: Some(pages),
        })
    }

    fn prepare_text(&self, text: &str, client: &str) -> ServiceResult<PreparedInput> {
        let limits = self.runtime_config.dynamic().limits.clone();

        let text = normalize_text(text);
        let length = text.chars().count();
        if length < limits.min_text_chars {
            return Err(ServiceError::TextTooShort {
                length,
                min: limits.min_text_chars,
            });
        }
        if length > limits.max_text_chars {
            return Err(ServiceError::TextTooLong {
                length,
                max: limits.max_text_chars,
            });
        }

        self.check_rate_limit(client)?;

        Ok(PreparedInput {
            text,
            source: ProcessingSource::Text,
            used_ocr: false,
            pages: None,
        })
    }

    async fn simplify_prepared(
        &self,
        input: PreparedInput,
        client: &str,
        started: Instant,
    ) -> ServiceResult<SimplificationResponse> {
        let max_prompt_chars = self.runtime_config.dynamic().limits.max_prompt_chars;

        let original_chars = input.text.chars().count();
        let (prompt_text, truncated) = truncate_chars(&input.text, max_prompt_chars);
        if truncated {
            info!(
                original_chars,
                kept_chars = prompt_text.chars().count(),
                "Document truncated to fit the prompt"
            );
        }

        let hash = compute_content_hash(prompt_text.as_bytes());

        let (result, cached) = match self.cache.get(&hash) {
            Some(hit) => {
                debug!(hash = %hash, "Serving simplification from cache");
                metrics::counter!("simplify_cache_hits_total").increment(1);
                (hit, true)
            }
            None => {
                let completion = self
                    .llm
                    .complete(SYSTEM_PROMPT, &build_simplification_prompt(&prompt_text))
                    .await?;
                debug!(attempts = completion.attempts, model = %completion.model, "LLM completion received");
                let analysis = analyze(&prompt_text, &completion.text);
                let value = CachedSimplification {
                    text: completion.text,
                    provider: completion.provider,
                    model: completion.model,
                    analysis,
                };
                self.cache.insert(hash.clone(), value.clone());
                (value, false)
            }
        };
        self.cache.remember_for_client(client, &hash);

        let simplified_chars = result.text.chars().count();
        let reduction = reduction_percent(original_chars, simplified_chars);
        let elapsed = started.elapsed();

        let record = HistoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            result_hash: hash.clone(),
            source: input.source,
            original_chars,
            simplified_chars,
            reduction_percent: reduction,
            model: result.model.clone(),
            provider: Some(result.provider.to_string()),
            cached,
            used_ocr: input.used_ocr,
            duration_ms: elapsed.as_millis() as u64,
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.db.insert_history(&record) {
            warn!(error = %format_error_chain(&e), "Failed to record processing history");
        }

        metrics::histogram!("simplify_duration_seconds").record(elapsed.as_secs_f64());
        info!(
            source = input.source.as_str(),
            model = %result.model,
            cached,
            original_chars,
            simplified_chars,
            duration_ms = record.duration_ms,
            "Simplification complete"
        );

        Ok(SimplificationResponse {
            download_url: format!("/download_pdf?hash={}", urlencoding::encode(&hash)),
            texto: result.text,
            analise: result.analysis,
            modelo_usado: result.model,
            provedor: result.provider.to_string(),
            caracteres_original: original_chars,
            caracteres_simplificado: simplified_chars,
            reducao_percentual: reduction,
            hash,
            em_cache: cached,
            ocr: input.used_ocr,
            paginas: input.pages,
            truncado: truncated,
        })
    }

    /// Render a cached result as PDF.
    ///
    /// Without a hash, the last result produced for `client` is used.
    pub async fn pdf_for(
        &self,
        hash: Option<&str>,
        client: &str,
        locale: &str,
    ) -> ServiceResult<(String, Vec<u8>)> {
        let hash = match hash.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hash) => {
                if !is_content_hash(hash) {
                    return Err(ServiceError::InvalidRequest {
                        message: "hash must be 64 hexadecimal characters".to_string(),
                    });
                }
                hash.to_string()
            }
            None => self
                .cache
                .last_for_client(client)
                .ok_or_else(|| ServiceError::ResultNotFound {
                    hash: "latest".to_string(),
                })?,
        };

        let cached = self
            .cache
            .get(&hash)
            .ok_or(ServiceError::ResultNotFound { hash: hash.clone() })?;

        let options = self.render_options(locale);
        let bytes = tokio::task::spawn_blocking(move || render_pdf(&cached.text, &options))
            .await
            .map_err(join_error)??;

        metrics::counter!("pdf_downloads_total").increment(1);
        debug!(hash = %hash, size = bytes.len(), "Rendered simplified PDF");

        Ok((PDF_FILENAME.to_string(), bytes))
    }

    pub(crate) fn render_options(&self, locale: &str) -> RenderOptions {
        let date = chrono::Local::now().format("%d/%m/%Y %H:%M").to_string();

        RenderOptions {
            title: self.i18n.get(locale, "pdf-title", None),
            subtitle: self.i18n.format(locale, "pdf-generated-at", &[("date", &date)]),
            disclaimer: self.i18n.get(locale, "pdf-disclaimer", None),
            page_label: self.i18n.format(
                locale,
                "pdf-page-footer",
                &[("page", "{page}"), ("total", "{total}")],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ResultKind;
    use crate::llm::test_support::spawn_mock;
    use crate::service::test_support::service_with;
    use axum::{Json, Router, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DECISION: &str = "Vistos. Julgo procedente o pedido e condeno o réu ao pagamento \
        de R$ 5.000,00 no prazo de 15 dias.";

    async fn counting_openai(calls: Arc<AtomicUsize>) -> String {
        spawn_mock(Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({
                        "choices": [{ "message": { "role": "assistant", "content": "Você ganhou." } }]
                    }))
                }
            }),
        ))
        .await
    }

    #[tokio::test]
    async fn test_simplify_text_then_cache_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = counting_openai(calls.clone()).await;
        let service = service_with(&base, |_| {});

        let first = service.simplify_text(DECISION, "client-a").await.unwrap();
        assert_eq!(first.texto, "Você ganhou.");
        assert_eq!(first.modelo_usado, "gpt-4o-mini");
        assert_eq!(first.provedor, "openai");
        assert_eq!(first.analise.tipo_resultado, ResultKind::Vitoria);
        assert!(first.analise.tem_valores);
        assert!(first.analise.tem_prazos);
        assert!(!first.em_cache);
        assert!(first.paginas.is_none());
        assert_eq!(first.download_url, format!("/download_pdf?hash={}", first.hash));
        assert!(first.reducao_percentual > 0.0);

        let second = service.simplify_text(DECISION, "client-b").await.unwrap();
        assert!(second.em_cache);
        assert_eq!(second.hash, first.hash);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = service.stats().unwrap();
        assert_eq!(stats.processing.total_requests, 2);
        assert_eq!(stats.processing.cache_hits, 1);
        assert_eq!(service.cache.last_for_client("client-b"), Some(first.hash));
    }

    #[tokio::test]
    async fn test_simplify_text_length_limits() {
        let service = service_with("http://127.0.0.1:9", |d| {
            d.limits.min_text_chars = 10;
            d.limits.max_text_chars = 50;
        });

        let err = service.simplify_text("   curto  ", "c").await.unwrap_err();
        assert!(matches!(err, ServiceError::TextTooShort { length: 5, min: 10 }));

        let err = service.simplify_text(&"a".repeat(51), "c").await.unwrap_err();
        assert!(matches!(err, ServiceError::TextTooLong { max: 50, .. }));
    }

    #[tokio::test]
    async fn test_validation_failures_do_not_consume_quota() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = counting_openai(calls.clone()).await;
        let service = service_with(&base, |d| d.rate_limit.requests_per_minute = 1);

        assert!(service.simplify_text("x", "c").await.is_err());
        assert!(service.simplify_text(DECISION, "c").await.is_ok());

        let err = service.simplify_text(DECISION, "c").await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_long_text_is_truncated_for_prompt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = counting_openai(calls).await;
        let service = service_with(&base, |d| d.limits.max_prompt_chars = 40);

        let response = service.simplify_text(DECISION, "c").await.unwrap();
        assert!(response.truncado);
        assert_eq!(response.caracteres_original, DECISION.chars().count());
    }

    #[tokio::test]
    async fn test_simplify_pdf_rejects_non_pdf() {
        let service = service_with("http://127.0.0.1:9", |_| {});
        let err = service
            .simplify_pdf(b"hello world".to_vec(), "notes.TXT", "c")
            .await
            .unwrap_err();
        match err {
            ServiceError::Processing(ProcessingError::UnsupportedFormat { format }) => {
                assert_eq!(format, "txt")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simplify_pdf_rejects_oversized_upload() {
        let service = service_with("http://127.0.0.1:9", |d| d.limits.max_upload_bytes = 8);
        let err = service
            .simplify_pdf(b"%PDF-1.7 and more".to_vec(), "a.pdf", "c")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Processing(ProcessingError::FileTooLarge { size: 17, max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_pdf_for_requires_known_result() {
        let service = service_with("http://127.0.0.1:9", |_| {});

        let err = service.pdf_for(None, "nobody", "pt-BR").await.unwrap_err();
        assert!(matches!(err, ServiceError::ResultNotFound { .. }));

        let err = service.pdf_for(Some("xyz"), "c", "pt-BR").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));

        let err = service
            .pdf_for(Some(&"a".repeat(64)), "c", "pt-BR")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ResultNotFound { .. }));
    }

    #[test]
    fn test_render_options_are_localized() {
        let service = service_with("http://127.0.0.1:9", |_| {});

        let pt = service.render_options("pt-BR");
        assert_eq!(pt.title, "Documento Simplificado");
        assert_eq!(pt.page_label, "Página {page} de {total}");
        assert!(pt.subtitle.starts_with("Gerado em "));

        let en = service.render_options("en");
        assert_eq!(en.title, "Simplified Document");
    }
}
