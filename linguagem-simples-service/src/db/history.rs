//! Processing history operations.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use super::{Database, HistoryRecord, ModelUsage, ProcessingStats, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

const HISTORY_COLUMNS: &str = "id, result_hash, source, original_chars, simplified_chars, \
     reduction_percent, model, provider, cached, used_ocr, duration_ms, created_at";

impl Database {
    pub fn insert_history(&self, record: &HistoryRecord) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            &format!(
                "INSERT INTO processing_history ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                HISTORY_COLUMNS
            ),
            params![
                record.id,
                record.result_hash,
                record.source.as_str(),
                record.original_chars as i64,
                record.simplified_chars as i64,
                record.reduction_percent,
                record.model,
                record.provider,
                record.cached,
                record.used_ocr,
                record.duration_ms as i64,
                format_timestamp(record.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Most recent history rows, newest first.
    pub fn recent_history(&self, limit: usize) -> ServiceResult<Vec<HistoryRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM processing_history ORDER BY created_at DESC LIMIT ?1",
                HISTORY_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let records = stmt
            .query_map(params![limit as i64], HistoryRecord::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(records)
    }

    pub fn processing_stats(&self) -> ServiceResult<ProcessingStats> {
        let conn = self.conn.lock().unwrap();
        let since = format_timestamp(Utc::now() - Duration::hours(24));

        let mut stats = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(source = 'pdf'), 0),
                        COALESCE(SUM(source = 'text'), 0),
                        COALESCE(SUM(cached), 0),
                        COALESCE(SUM(used_ocr), 0),
                        COALESCE(SUM(created_at >= ?1), 0),
                        AVG(reduction_percent),
                        AVG(duration_ms)
                 FROM processing_history",
                params![since],
                |row| {
                    Ok(ProcessingStats {
                        total_requests: row.get::<_, i64>(0)?.max(0) as u64,
                        pdf_requests: row.get::<_, i64>(1)?.max(0) as u64,
                        text_requests: row.get::<_, i64>(2)?.max(0) as u64,
                        cache_hits: row.get::<_, i64>(3)?.max(0) as u64,
                        ocr_requests: row.get::<_, i64>(4)?.max(0) as u64,
                        requests_last_24h: row.get::<_, i64>(5)?.max(0) as u64,
                        average_reduction_percent: row
                            .get::<_, Option<f64>>(6)?
                            .map(|v| (v * 10.0).round() / 10.0),
                        average_duration_ms: row
                            .get::<_, Option<f64>>(7)?
                            .map(|v| v.round()),
                        models: Vec::new(),
                    })
                },
            )
            .map_err(DatabaseError::Query)?;

        let mut stmt = conn
            .prepare(
                "SELECT model, COUNT(*) FROM processing_history
                 GROUP BY model ORDER BY COUNT(*) DESC, model ASC",
            )
            .map_err(DatabaseError::Query)?;

        stats.models = stmt
            .query_map([], |row| {
                Ok(ModelUsage {
                    model: row.get(0)?,
                    requests: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(stats)
    }

    /// Delete history older than `cutoff`. Returns rows removed.
    pub fn delete_history_before(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn
            .execute(
                "DELETE FROM processing_history WHERE created_at < ?1",
                params![format_timestamp(cutoff)],
            )
            .map_err(DatabaseError::Query)?;

        Ok(deleted)
    }
}
