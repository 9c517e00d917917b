//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::parse_timestamp;

/// Where a simplified text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingSource {
    Pdf,
    Text,
}

impl ProcessingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingSource::Pdf => "pdf",
            ProcessingSource::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pdf" => ProcessingSource::Pdf,
            _ => ProcessingSource::Text,
        }
    }
}

/// Feedback as submitted by a user
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub rating: u8,
    pub comment: Option<String>,
    pub result_hash: Option<String>,
}

/// Aggregate of all feedback
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackSummary {
    pub total: u64,
    pub average_rating: Option<f64>,
    /// Count per rating, index 0 is one star
    pub distribution: [u64; 5],
    pub with_comment: u64,
}

/// A processing history row
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: String,
    pub result_hash: String,
    pub source: ProcessingSource,
    pub original_chars: usize,
    pub simplified_chars: usize,
    pub reduction_percent: f64,
    pub model: String,
    pub provider: Option<String>,
    pub cached: bool,
    pub used_ocr: bool,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let source_str: String = row.get(2)?;
        let original_chars: i64 = row.get(3)?;
        let simplified_chars: i64 = row.get(4)?;
        let duration_ms: i64 = row.get(10)?;
        let created_at_str: String = row.get(11)?;

        Ok(Self {
            id: row.get(0)?,
            result_hash: row.get(1)?,
            source: ProcessingSource::from_str(&source_str),
            original_chars: original_chars.max(0) as usize,
            simplified_chars: simplified_chars.max(0) as usize,
            reduction_percent: row.get(5)?,
            model: row.get(6)?,
            provider: row.get(7)?,
            cached: row.get(8)?,
            used_ocr: row.get(9)?,
            duration_ms: duration_ms.max(0) as u64,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Requests served per model
#[derive(Debug, Clone, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub requests: u64,
}

/// Aggregate processing statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub total_requests: u64,
    pub pdf_requests: u64,
    pub text_requests: u64,
    pub cache_hits: u64,
    pub ocr_requests: u64,
    pub requests_last_24h: u64,
    pub average_reduction_percent: Option<f64>,
    pub average_duration_ms: Option<f64>,
    pub models: Vec<ModelUsage>,
}
