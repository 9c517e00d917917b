use arc_swap::ArcSwap;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::{ModelSpec, Provider};

/// Environment variable prefix, e.g. `LINGUAGEM_SIMPLES__SERVER__PORT=9000`
const ENV_PREFIX: &str = "LINGUAGEM_SIMPLES";

// ==================== Static Configuration (startup-only) ====================

/// Static configuration that cannot be changed at runtime
/// These settings affect server binding, storage or secrets and require a restart
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub credentials: Credentials,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional directory with a web front-end, served for unmatched paths.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Provider API keys. Never serialized back out through the settings API.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "***"),
            )
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    /// API key for a provider, ignoring blank values.
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Claude => self.anthropic_api_key.as_deref(),
            Provider::OpenAi => self.openai_api_key.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    /// Fill missing keys from the providers' conventional environment variables.
    fn with_conventional_env(mut self) -> Self {
        fn env(names: &[&str]) -> Option<String> {
            names
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .find(|value| !value.trim().is_empty())
        }

        if self.gemini_api_key.is_none() {
            self.gemini_api_key = env(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        }
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = env(&["ANTHROPIC_API_KEY"]);
        }
        if self.openai_api_key.is_none() {
            self.openai_api_key = env(&["OPENAI_API_KEY"]);
        }
        self
    }
}

// ==================== Dynamic Configuration (hot-reloadable) ====================

/// Dynamic configuration that can be updated at runtime via API
/// DB values override config file/env defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// LLM provider chain and request tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ordered fallback chain of `provider:model` entries
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_claude_base_url")]
    pub claude_base_url: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts per model on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            gemini_base_url: default_gemini_base_url(),
            claude_base_url: default_claude_base_url(),
            openai_base_url: default_openai_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl LlmConfig {
    /// Parse the configured chain, skipping malformed entries.
    pub fn model_chain(&self) -> Vec<ModelSpec> {
        self.models
            .iter()
            .filter_map(|entry| match entry.parse::<ModelSpec>() {
                Ok(spec) => Some(spec),
                Err(e) => {
                    warn!(entry = %entry, error = %e, "Ignoring invalid model chain entry");
                    None
                }
            })
            .collect()
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        let url = match provider {
            Provider::Gemini => &self.gemini_base_url,
            Provider::Claude => &self.claude_base_url,
            Provider::OpenAi => &self.openai_base_url,
        };
        url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Upper bound for a whole request, including every retry.
    pub fn overall_timeout(&self) -> Duration {
        let attempts = u64::from(self.max_retries) + 1;
        Duration::from_secs(self.request_timeout_secs.saturating_mul(attempts) + 30)
    }
}

/// Input size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Minimum length of pasted text
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Maximum length of pasted text
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Extracted text is truncated to this many characters before prompting
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            min_text_chars: default_min_text_chars(),
            max_text_chars: default_max_text_chars(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// Per-client request limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Simplification requests allowed per client per minute (0 = unlimited)
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Identify clients by the first `X-Forwarded-For` entry when present.
    /// Only safe behind a reverse proxy that overwrites the header.
    #[serde(default = "default_trust_forwarded_for")]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            trust_forwarded_for: default_trust_forwarded_for(),
        }
    }
}

/// In-memory result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Run the expiry sweep every N seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// OCR fallback for scanned PDFs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_enabled")]
    pub enabled: bool,

    /// Tesseract language code
    #[serde(default = "default_ocr_language")]
    pub language: String,

    #[serde(default = "default_ocr_dpi")]
    pub dpi: u32,

    /// OCR runs when the text layer has fewer alphanumeric characters than this
    #[serde(default = "default_ocr_min_text_chars")]
    pub min_text_chars: usize,

    #[serde(default = "default_ocr_max_pages")]
    pub max_pages: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: default_ocr_enabled(),
            language: default_ocr_language(),
            dpi: default_ocr_dpi(),
            min_text_chars: default_ocr_min_text_chars(),
            max_pages: default_ocr_max_pages(),
        }
    }
}

/// Processing history retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Delete history rows older than this many days (0 = keep forever)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

// ==================== DynamicConfig Settings Keys ====================

/// All valid setting keys for DynamicConfig
pub const VALID_SETTING_KEYS: &[&str] = &[
    "llm.models",
    "llm.gemini_base_url",
    "llm.claude_base_url",
    "llm.openai_base_url",
    "llm.temperature",
    "llm.max_output_tokens",
    "llm.request_timeout_secs",
    "llm.max_retries",
    "llm.retry_backoff_ms",
    "llm.max_backoff_ms",
    "limits.max_upload_bytes",
    "limits.min_text_chars",
    "limits.max_text_chars",
    "limits.max_prompt_chars",
    "rate_limit.requests_per_minute",
    "rate_limit.trust_forwarded_for",
    "cache.ttl_secs",
    "cache.max_entries",
    "cache.sweep_interval_secs",
    "ocr.enabled",
    "ocr.language",
    "ocr.dpi",
    "ocr.min_text_chars",
    "ocr.max_pages",
    "history.retention_days",
];

impl DynamicConfig {
    /// Get all valid setting keys
    pub fn valid_keys() -> HashSet<&'static str> {
        VALID_SETTING_KEYS.iter().copied().collect()
    }

    /// Convert config to key-value map for API response
    pub fn to_key_value_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        let mut put = |key: &str, value: serde_json::Value| {
            map.insert(key.to_string(), value);
        };

        put("llm.models", serde_json::json!(self.llm.models));
        put("llm.gemini_base_url", serde_json::json!(self.llm.gemini_base_url));
        put("llm.claude_base_url", serde_json::json!(self.llm.claude_base_url));
        put("llm.openai_base_url", serde_json::json!(self.llm.openai_base_url));
        put("llm.temperature", serde_json::json!(self.llm.temperature));
        put("llm.max_output_tokens", serde_json::json!(self.llm.max_output_tokens));
        put(
            "llm.request_timeout_secs",
            serde_json::json!(self.llm.request_timeout_secs),
        );
        put("llm.max_retries", serde_json::json!(self.llm.max_retries));
        put("llm.retry_backoff_ms", serde_json::json!(self.llm.retry_backoff_ms));
        put("llm.max_backoff_ms", serde_json::json!(self.llm.max_backoff_ms));

        put(
            "limits.max_upload_bytes",
            serde_json::json!(self.limits.max_upload_bytes),
        );
        put("limits.min_text_chars", serde_json::json!(self.limits.min_text_chars));
        put("limits.max_text_chars", serde_json::json!(self.limits.max_text_chars));
        put(
            "limits.max_prompt_chars",
            serde_json::json!(self.limits.max_prompt_chars),
        );

        put(
            "rate_limit.requests_per_minute",
            serde_json::json!(self.rate_limit.requests_per_minute),
        );
        put(
            "rate_limit.trust_forwarded_for",
            serde_json::json!(self.rate_limit.trust_forwarded_for),
        );

        put("cache.ttl_secs", serde_json::json!(self.cache.ttl_secs));
        put("cache.max_entries", serde_json::json!(self.cache.max_entries));
        put(
            "cache.sweep_interval_secs",
            serde_json::json!(self.cache.sweep_interval_secs),
        );

        put("ocr.enabled", serde_json::json!(self.ocr.enabled));
        put("ocr.language", serde_json::json!(self.ocr.language));
        put("ocr.dpi", serde_json::json!(self.ocr.dpi));
        put("ocr.min_text_chars", serde_json::json!(self.ocr.min_text_chars));
        put("ocr.max_pages", serde_json::json!(self.ocr.max_pages));

        put(
            "history.retention_days",
            serde_json::json!(self.history.retention_days),
        );

        map
    }

    /// Apply DB settings as overrides to this config
    pub fn merge_from_db(&mut self, db_settings: &HashMap<String, serde_json::Value>) {
        for (key, value) in db_settings {
            if !self.apply_setting(key, value) {
                warn!(key = %key, value = %value, "Ignoring invalid setting in merge_from_db");
            }
        }
    }

    /// Whether `value` has the type `key` expects. `null` clears an override.
    pub fn accepts_setting(key: &str, value: &serde_json::Value) -> bool {
        value.is_null() || Self::default().apply_setting(key, value)
    }

    /// Apply a single setting value; false when the key is unknown or the type is wrong
    fn apply_setting(&mut self, key: &str, value: &serde_json::Value) -> bool {
        match key {
            // LLM settings
            "llm.models" => {
                if let Some(entries) = value.as_array() {
                    let Some(models) = entries
                        .iter()
                        .map(|v| v.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                    else {
                        return false;
                    };
                    self.llm.models = models;
                } else if let Some(v) = value.as_str() {
                    self.llm.models = v
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                } else {
                    return false;
                }
            }
            "llm.gemini_base_url" => {
                let Some(v) = value.as_str() else {
                    return false;
                };
                self.llm.gemini_base_url = v.to_string();
            }
            "llm.claude_base_url" => {
                let Some(v) = value.as_str() else {
                    return false;
                };
                self.llm.claude_base_url = v.to_string();
            }
            "llm.openai_base_url" => {
                let Some(v) = value.as_str() else {
                    return false;
                };
                self.llm.openai_base_url = v.to_string();
            }
            "llm.temperature" => {
                let Some(v) = value.as_f64() else {
                    return false;
                };
                self.llm.temperature = v as f32;
            }
            "llm.max_output_tokens" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.llm.max_output_tokens = v as u32;
            }
            "llm.request_timeout_secs" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.llm.request_timeout_secs = v;
            }
            "llm.max_retries" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.llm.max_retries = v as u32;
            }
            "llm.retry_backoff_ms" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.llm.retry_backoff_ms = v;
            }
            "llm.max_backoff_ms" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.llm.max_backoff_ms = v;
            }

            // Limits settings
            "limits.max_upload_bytes" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.limits.max_upload_bytes = v;
            }
            "limits.min_text_chars" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.limits.min_text_chars = v as usize;
            }
            "limits.max_text_chars" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.limits.max_text_chars = v as usize;
            }
            "limits.max_prompt_chars" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.limits.max_prompt_chars = v as usize;
            }

            // Rate limit settings
            "rate_limit.requests_per_minute" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.rate_limit.requests_per_minute = v as u32;
            }
            "rate_limit.trust_forwarded_for" => {
                let Some(v) = value.as_bool() else {
                    return false;
                };
                self.rate_limit.trust_forwarded_for = v;
            }

            // Cache settings
            "cache.ttl_secs" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.cache.ttl_secs = v;
            }
            "cache.max_entries" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.cache.max_entries = v as usize;
            }
            "cache.sweep_interval_secs" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.cache.sweep_interval_secs = v;
            }

            // OCR settings
            "ocr.enabled" => {
                let Some(v) = value.as_bool() else {
                    return false;
                };
                self.ocr.enabled = v;
            }
            "ocr.language" => {
                let Some(v) = value.as_str() else {
                    return false;
                };
                self.ocr.language = v.to_string();
            }
            "ocr.dpi" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.ocr.dpi = v as u32;
            }
            "ocr.min_text_chars" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.ocr.min_text_chars = v as usize;
            }
            "ocr.max_pages" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.ocr.max_pages = v as usize;
            }

            // History settings
            "history.retention_days" => {
                let Some(v) = value.as_u64() else {
                    return false;
                };
                self.history.retention_days = v as u32;
            }

            _ => return false,
        }
        true
    }
}

// ==================== RuntimeConfig (combines static + dynamic) ====================

/// Runtime configuration manager
/// Combines static config (startup-only) with dynamic config (hot-reloadable via ArcSwap)
pub struct RuntimeConfig {
    /// Static configuration (never changes after startup)
    pub static_config: StaticConfig,
    /// Dynamic configuration (can be hot-reloaded)
    dynamic: ArcSwap<DynamicConfig>,
}

impl RuntimeConfig {
    pub fn new(static_config: StaticConfig, dynamic: DynamicConfig) -> Self {
        Self {
            static_config,
            dynamic: ArcSwap::from_pointee(dynamic),
        }
    }

    /// Get current dynamic config snapshot (lock-free read)
    pub fn dynamic(&self) -> arc_swap::Guard<Arc<DynamicConfig>> {
        self.dynamic.load()
    }

    /// Owned snapshot of the dynamic config, safe to hold across awaits
    pub fn snapshot(&self) -> Arc<DynamicConfig> {
        self.dynamic.load_full()
    }

    /// Update dynamic config (atomic swap)
    pub fn update_dynamic(&self, new_config: DynamicConfig) {
        self.dynamic.store(Arc::new(new_config));
    }

    /// Load config from all sources with DB overrides
    pub fn load(static_config: StaticConfig, db: &Database) -> ServiceResult<Self> {
        let mut dynamic = load_dynamic_config()?;
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);

        Ok(Self::new(static_config, dynamic))
    }

    /// Rebuild dynamic config from file/env defaults + DB and swap atomically
    pub fn reload_from_db(&self, db: &Database) -> ServiceResult<()> {
        let mut dynamic = load_dynamic_config()?;
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);
        self.update_dynamic(dynamic);
        Ok(())
    }
}

// ==================== Config Loading Functions ====================

fn config_sources() -> Result<Config, config::ConfigError> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("llm.models")
                .try_parsing(true),
        )
        .build()
}

/// Load static configuration from file and env vars
pub fn load_static_config() -> ServiceResult<StaticConfig> {
    let config: StaticConfig = config_sources()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize static config: {}", e),
        })?;

    Ok(StaticConfig {
        credentials: config.credentials.with_conventional_env(),
        ..config
    })
}

/// Load dynamic configuration from file and env vars (without DB overrides)
fn load_dynamic_config() -> ServiceResult<DynamicConfig> {
    config_sources()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize dynamic config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_models() -> Vec<String> {
    vec![
        "gemini:gemini-2.0-flash".to_string(),
        "claude:claude-3-5-haiku-latest".to_string(),
        "openai:gpt-4o-mini".to_string(),
    ]
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_claude_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

fn default_min_text_chars() -> usize {
    20
}

fn default_max_text_chars() -> usize {
    10_000
}

fn default_max_prompt_chars() -> usize {
    30_000
}

fn default_requests_per_minute() -> u32 {
    10
}

fn default_trust_forwarded_for() -> bool {
    false
}

fn default_cache_ttl_secs() -> u64 {
    60 * 60 // 1 hour
}

fn default_cache_max_entries() -> usize {
    500
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_ocr_enabled() -> bool {
    true
}

fn default_ocr_language() -> String {
    "por".to_string()
}

fn default_ocr_dpi() -> u32 {
    200
}

fn default_ocr_min_text_chars() -> usize {
    100
}

fn default_ocr_max_pages() -> usize {
    20
}

fn default_retention_days() -> u32 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DynamicConfig::default();
        assert_eq!(config.limits.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.min_text_chars, 20);
        assert_eq!(config.limits.max_text_chars, 10_000);
        assert_eq!(config.rate_limit.requests_per_minute, 10);
        assert!(!config.rate_limit.trust_forwarded_for);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.llm.model_chain().len(), 3);
    }

    #[test]
    fn test_key_value_map_covers_valid_keys() {
        let map = DynamicConfig::default().to_key_value_map();
        for key in VALID_SETTING_KEYS {
            assert!(map.contains_key(*key), "missing {key}");
        }
        assert_eq!(map.len(), VALID_SETTING_KEYS.len());
    }

    #[test]
    fn test_merge_from_db() {
        let mut config = DynamicConfig::default();
        let mut settings = HashMap::new();
        settings.insert("llm.models".to_string(), serde_json::json!(["openai:gpt-4o"]));
        settings.insert("cache.ttl_secs".to_string(), serde_json::json!(60));
        settings.insert("ocr.enabled".to_string(), serde_json::json!(false));
        settings.insert("llm.temperature".to_string(), serde_json::json!(0.5));

        config.merge_from_db(&settings);

        assert_eq!(config.llm.models, vec!["openai:gpt-4o".to_string()]);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(!config.ocr.enabled);
        assert!((config.llm.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_accepts_setting_checks_types() {
        assert!(DynamicConfig::accepts_setting("cache.ttl_secs", &serde_json::json!(60)));
        assert!(DynamicConfig::accepts_setting("cache.ttl_secs", &serde_json::Value::Null));
        assert!(DynamicConfig::accepts_setting("llm.temperature", &serde_json::json!(1)));
        assert!(!DynamicConfig::accepts_setting("cache.ttl_secs", &serde_json::json!("60")));
        assert!(!DynamicConfig::accepts_setting("cache.ttl_secs", &serde_json::json!(-1)));
        assert!(!DynamicConfig::accepts_setting("ocr.language", &serde_json::json!(false)));
        assert!(!DynamicConfig::accepts_setting("no.such.key", &serde_json::json!(1)));
    }

    #[test]
    fn test_models_accepts_comma_separated_string() {
        let mut config = DynamicConfig::default();
        let mut settings = HashMap::new();
        settings.insert(
            "llm.models".to_string(),
            serde_json::json!("claude:claude-3-5-haiku-latest, openai:gpt-4o-mini"),
        );
        config.merge_from_db(&settings);

        let chain = config.llm.model_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].provider, Provider::Claude);
        assert_eq!(chain[1].model, "gpt-4o-mini");
    }

    #[test]
    fn test_model_chain_skips_invalid_entries() {
        let llm = LlmConfig {
            models: vec![
                "gemini:gemini-2.0-flash".to_string(),
                "mistral:large".to_string(),
                "no-provider".to_string(),
            ],
            ..LlmConfig::default()
        };
        assert_eq!(llm.model_chain().len(), 1);
    }

    #[test]
    fn test_credentials_ignore_blank_keys() {
        let credentials = Credentials {
            gemini_api_key: Some("  ".to_string()),
            anthropic_api_key: Some("sk-ant".to_string()),
            openai_api_key: None,
        };
        assert_eq!(credentials.api_key(Provider::Gemini), None);
        assert_eq!(credentials.api_key(Provider::Claude), Some("sk-ant"));
        assert_eq!(credentials.api_key(Provider::OpenAi), None);
        assert!(!format!("{credentials:?}").contains("sk-ant"));
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let llm = LlmConfig {
            openai_base_url: "http://localhost:9000/".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.base_url(Provider::OpenAi), "http://localhost:9000");
    }
}
