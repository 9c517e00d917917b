//! Hosted LLM access with retry/backoff and model fallback.
//!
//! The configured chain (`llm.models`) is walked in order. Each model gets up
//! to `1 + max_retries` attempts for transient failures (429, 5xx, timeouts,
//! connection errors); anything else moves straight to the next model.

mod claude;
mod gemini;
mod openai;
pub mod prompts;

use rand::Rng;
use reqwest::{Client, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, RuntimeConfig};
use crate::error::{LlmError, ServiceError, ServiceResult};

/// Longest error body kept from a provider response
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Supported LLM providers
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    Gemini,
    Claude,
    OpenAi,
}

/// One entry of the fallback chain, written `provider:model` in config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
}

impl FromStr for ModelSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s
            .split_once(':')
            .ok_or_else(|| format!("expected provider:model, got '{}'", s))?;
        let provider = provider
            .trim()
            .parse::<Provider>()
            .map_err(|_| format!("unknown provider '{}'", provider.trim()))?;
        let model = model.trim();
        if model.is_empty() {
            return Err("model name is empty".to_string());
        }
        Ok(Self {
            provider,
            model: model.to_string(),
        })
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// A successful completion
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub provider: Provider,
    pub model: String,
    /// Total attempts across the chain, including the successful one
    pub attempts: u32,
}

/// Chain entry as reported by `GET /api/models`
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub provider: Provider,
    pub model: String,
    /// Whether an API key is available for the provider
    pub configured: bool,
}

/// Provider-agnostic request parameters
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

/// Client for the configured LLM providers
pub struct LlmClient {
    http: Client,
    runtime_config: Arc<RuntimeConfig>,
}

impl LlmClient {
    pub fn new(runtime_config: Arc<RuntimeConfig>) -> ServiceResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("linguagem-simples/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            runtime_config,
        })
    }

    /// The configured chain with key availability.
    pub fn available_models(&self) -> Vec<ModelStatus> {
        let credentials = &self.runtime_config.static_config.credentials;
        self.runtime_config
            .dynamic()
            .llm
            .model_chain()
            .into_iter()
            .map(|spec| ModelStatus {
                configured: credentials.api_key(spec.provider).is_some(),
                provider: spec.provider,
                model: spec.model,
            })
            .collect()
    }

    /// Providers that have at least one usable chain entry.
    pub fn configured_providers(&self) -> Vec<Provider> {
        let mut providers = Vec::new();
        for status in self.available_models() {
            if status.configured && !providers.contains(&status.provider) {
                providers.push(status.provider);
            }
        }
        providers
    }

    /// Run the prompt through the fallback chain.
    pub async fn complete(&self, system: &str, prompt: &str) -> ServiceResult<Completion> {
        let dynamic = self.runtime_config.snapshot();
        let llm = &dynamic.llm;
        let credentials = &self.runtime_config.static_config.credentials;

        let chain: Vec<(ModelSpec, &str)> = llm
            .model_chain()
            .into_iter()
            .filter_map(|spec| {
                let key = credentials.api_key(spec.provider);
                if key.is_none() {
                    debug!(model = %spec, "Skipping model without API key");
                }
                key.map(|key| (spec, key))
            })
            .collect();

        if chain.is_empty() {
            return Err(LlmError::NoProviders.into());
        }

        let mut attempts = 0u32;
        let mut last_error: Option<LlmError> = None;

        for (spec, api_key) in &chain {
            match self
                .complete_with_retries(llm, spec, api_key, system, prompt, &mut attempts)
                .await
            {
                Ok(text) => {
                    return Ok(Completion {
                        text,
                        provider: spec.provider,
                        model: spec.model.clone(),
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(model = %spec, error = %e, "Model failed, trying next in chain");
                    last_error = Some(e);
                }
            }
        }

        Err(LlmError::AllModelsFailed {
            attempted: chain.len(),
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        }
        .into())
    }

    async fn complete_with_retries(
        &self,
        llm: &LlmConfig,
        spec: &ModelSpec,
        api_key: &str,
        system: &str,
        prompt: &str,
        attempts: &mut u32,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &spec.model,
            system,
            prompt,
            temperature: llm.temperature,
            max_output_tokens: llm.max_output_tokens,
            timeout: llm.request_timeout(),
        };
        let base_url = llm.base_url(spec.provider);

        let mut attempt = 0u32;
        let mut retry_after_secs: Option<u64> = None;
        loop {
            if attempt > 0 {
                let delay = match retry_after_secs {
                    Some(_) => backoff_delay(attempt, llm.retry_backoff_ms, llm.max_backoff_ms, retry_after_secs),
                    None => with_jitter(backoff_delay(
                        attempt,
                        llm.retry_backoff_ms,
                        llm.max_backoff_ms,
                        None,
                    )),
                };
                debug!(model = %spec, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
                tokio::time::sleep(delay).await;
            }

            *attempts += 1;
            let started = Instant::now();
            let result = match spec.provider {
                Provider::Gemini => gemini::generate(&self.http, base_url, api_key, &request).await,
                Provider::Claude => claude::generate(&self.http, base_url, api_key, &request).await,
                Provider::OpenAi => openai::generate(&self.http, base_url, api_key, &request).await,
            };

            let outcome = match &result {
                Ok(text) if !text.trim().is_empty() => "success",
                Ok(_) => "empty",
                Err(_) => "error",
            };
            metrics::counter!(
                "llm_requests_total",
                "provider" => spec.provider.to_string(),
                "outcome" => outcome
            )
            .increment(1);

            match result {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        model = %spec,
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        chars = text.chars().count(),
                        "LLM completion received"
                    );
                    return Ok(text.trim().to_string());
                }
                Ok(_) => {
                    return Err(LlmError::EmptyResponse {
                        provider: spec.provider.to_string(),
                    });
                }
                Err(e) => {
                    if !e.is_retryable() || attempt >= llm.max_retries {
                        return Err(e);
                    }
                    warn!(model = %spec, attempt = attempt + 1, error = %e, "Transient LLM failure");
                    retry_after_secs = e.retry_after_secs();
                    attempt += 1;
                }
            }
        }
    }
}

/// Delay before attempt `attempt` (1-based retry number).
///
/// A server-provided `Retry-After` wins over the exponential schedule; both
/// are capped at `max_ms`.
pub(crate) fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64, retry_after_secs: Option<u64>) -> Duration {
    let ms = match retry_after_secs {
        Some(secs) => secs.saturating_mul(1000),
        None => {
            let exponent = attempt.saturating_sub(1).min(16);
            base_ms.saturating_mul(1u64 << exponent)
        }
    };
    Duration::from_millis(ms.min(max_ms))
}

/// Add up to 10% random jitter.
fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = delay.as_millis() as u64 / 10;
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

/// Send a request and decode a JSON body, mapping transport and status errors.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: Provider,
    builder: RequestBuilder,
) -> Result<T, LlmError> {
    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            LlmError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            LlmError::Connection {
                provider: provider.to_string(),
                source: e,
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            retry_after_secs,
        });
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            LlmError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            LlmError::InvalidResponse {
                provider: provider.to_string(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub async fn spawn_mock(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
