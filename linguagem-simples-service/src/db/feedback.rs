//! Feedback storage operations.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::{Database, FeedbackSummary, NewFeedback, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Store a rating. Returns the new row id.
    pub fn insert_feedback(&self, feedback: &NewFeedback) -> ServiceResult<String> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO feedback (id, rating, comment, result_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                feedback.rating,
                feedback.comment,
                feedback.result_hash,
                format_timestamp(Utc::now()),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(id)
    }

    pub fn feedback_summary(&self) -> ServiceResult<FeedbackSummary> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT rating, COUNT(*), SUM(CASE WHEN comment IS NOT NULL AND comment != '' THEN 1 ELSE 0 END)
                 FROM feedback GROUP BY rating",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(DatabaseError::Query)?;

        let mut summary = FeedbackSummary::default();
        let mut rating_sum = 0u64;
        for row in rows {
            let (rating, count, with_comment) = row.map_err(DatabaseError::Query)?;
            if !(1..=5).contains(&rating) {
                continue;
            }
            let count = count.max(0) as u64;
            summary.distribution[(rating - 1) as usize] = count;
            summary.total += count;
            summary.with_comment += with_comment.max(0) as u64;
            rating_sum += rating as u64 * count;
        }

        if summary.total > 0 {
            let average = rating_sum as f64 / summary.total as f64;
            summary.average_rating = Some((average * 100.0).round() / 100.0);
        }

        Ok(summary)
    }
}
