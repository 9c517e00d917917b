//! Service coordinator shared by the HTTP handlers.

mod feedback;
mod simplification;

pub use simplification::SimplificationResponse;

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ResultCache};
use crate::config::{DynamicConfig, RuntimeConfig};
use crate::db::{Database, FeedbackSummary, ProcessingStats};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::i18n::I18n;
use crate::llm::LlmClient;
use crate::rate_limit::{ClientRateLimiter, retry_after_secs};

/// Main service coordinator
pub struct SimplifierService {
    pub runtime_config: Arc<RuntimeConfig>,
    pub db: Arc<Database>,
    pub llm: LlmClient,
    pub cache: ResultCache,
    pub rate_limiter: ClientRateLimiter,
    pub i18n: Arc<I18n>,
}

/// Response for GET /api/stats
#[derive(Debug, Serialize)]
pub struct ServiceStats {
    pub processing: ProcessingStats,
    pub feedback: FeedbackSummary,
    pub cache: CacheStats,
    pub rate_limited_clients: usize,
}

/// What one maintenance pass removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub cache_entries_removed: usize,
    pub history_rows_removed: usize,
}

impl SimplifierService {
    /// Create a new service instance
    /// Accepts a pre-opened database so that RuntimeConfig can load settings from it
    pub fn new(db: Arc<Database>, runtime_config: Arc<RuntimeConfig>) -> ServiceResult<Self> {
        info!("Initializing Linguagem Simples service");

        let dynamic = runtime_config.dynamic();

        let llm = LlmClient::new(runtime_config.clone())?;
        let configured = llm.configured_providers();
        if configured.is_empty() {
            warn!("No LLM provider has an API key; simplification requests will fail");
        } else {
            info!(providers = ?configured, "LLM providers configured");
        }

        let rate_limiter = ClientRateLimiter::new(dynamic.rate_limit.requests_per_minute);
        let cache = ResultCache::new(runtime_config.clone());

        Ok(Self {
            runtime_config: runtime_config.clone(),
            db,
            llm,
            cache,
            rate_limiter,
            i18n: Arc::new(I18n::new()),
        })
    }

    /// Admit a request from `client` or fail with `RateLimited`.
    pub fn check_rate_limit(&self, client: &str) -> ServiceResult<()> {
        self.rate_limiter.check(client).map_err(|wait| {
            metrics::counter!("rate_limited_requests_total").increment(1);
            ServiceError::RateLimited {
                retry_after_secs: retry_after_secs(wait),
            }
        })
    }

    /// Update settings and hot-reload affected components
    pub fn update_settings(
        &self,
        updates: HashMap<String, serde_json::Value>,
    ) -> ServiceResult<HashMap<String, serde_json::Value>> {
        let valid_keys = DynamicConfig::valid_keys();
        if let Some(unknown) = updates.keys().find(|key| !valid_keys.contains(key.as_str())) {
            return Err(ServiceError::InvalidRequest {
                message: format!("Unknown setting key: {}", unknown),
            });
        }
        if let Some((key, _)) = updates
            .iter()
            .find(|(key, value)| !DynamicConfig::accepts_setting(key, value))
        {
            return Err(ServiceError::InvalidRequest {
                message: format!("Invalid value type for setting: {}", key),
            });
        }

        self.db.set_settings(&updates)?;
        self.runtime_config.reload_from_db(&self.db)?;

        // The cache and LLM client read the config per call; the limiter has to be rebuilt
        let dynamic = self.runtime_config.dynamic();
        self.rate_limiter
            .reconfigure(dynamic.rate_limit.requests_per_minute);

        info!(keys = ?updates.keys().collect::<Vec<_>>(), "Settings updated");
        Ok(dynamic.to_key_value_map())
    }

    pub fn stats(&self) -> ServiceResult<ServiceStats> {
        Ok(ServiceStats {
            processing: self.db.processing_stats()?,
            feedback: self.db.feedback_summary()?,
            cache: self.cache.stats(),
            rate_limited_clients: self.rate_limiter.tracked_clients(),
        })
    }

    /// Periodic cleanup: cache expiry, limiter state and history retention.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let retention_days = self.runtime_config.dynamic().history.retention_days;

        let cache_entries_removed = self.cache.sweep();
        self.rate_limiter.retain_recent();

        let history_rows_removed = if retention_days > 0 {
            let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
            match self.db.delete_history_before(cutoff) {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %format_error_chain(&e), "History retention cleanup failed");
                    0
                }
            }
        } else {
            0
        };

        metrics::gauge!("result_cache_entries").set(self.cache.stats().entries as f64);
        debug!(cache_entries_removed, history_rows_removed, "Maintenance pass complete");

        MaintenanceReport {
            cache_entries_removed,
            history_rows_removed,
        }
    }
}
