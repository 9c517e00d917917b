//! Settings storage operations.
//!
//! Rows here override the file/env dynamic config, one JSON value per key.

use std::collections::HashMap;

use rusqlite::params;
use tracing::warn;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Get all settings as a map. Rows that are not valid JSON are skipped.
    pub fn get_all_settings(&self) -> ServiceResult<HashMap<String, serde_json::Value>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT key, value FROM settings")
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let value_str: String = row.get(1)?;
                Ok((key, value_str))
            })
            .map_err(DatabaseError::Query)?;

        let mut settings = HashMap::new();
        for row in rows {
            let (key, value_str) = row.map_err(DatabaseError::Query)?;
            match serde_json::from_str(&value_str) {
                Ok(value) => {
                    settings.insert(key, value);
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring unparseable setting"),
            }
        }

        Ok(settings)
    }

    /// Set multiple settings in a single transaction.
    /// Null values delete the setting (revert to default).
    pub fn set_settings(&self, settings: &HashMap<String, serde_json::Value>) -> ServiceResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        for (key, value) in settings {
            if value.is_null() {
                tx.execute("DELETE FROM settings WHERE key = ?1", params![key])
                    .map_err(DatabaseError::Query)?;
            } else {
                let value_str =
                    serde_json::to_string(value).map_err(DatabaseError::Serialization)?;
                tx.execute(
                    "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now')) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value_str],
                )
                .map_err(DatabaseError::Query)?;
            }
        }

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get_settings() {
        let db = Database::open_in_memory().unwrap();

        let mut update = HashMap::new();
        update.insert("rate_limit.requests_per_minute".to_string(), json!(30));
        update.insert("llm.models".to_string(), json!(["openai:gpt-4o-mini"]));
        db.set_settings(&update).unwrap();

        let settings = db.get_all_settings().unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings["rate_limit.requests_per_minute"], json!(30));
        assert_eq!(settings["llm.models"], json!(["openai:gpt-4o-mini"]));
    }

    #[test]
    fn test_upsert_and_null_deletes() {
        let db = Database::open_in_memory().unwrap();

        db.set_settings(&HashMap::from([("cache.ttl_secs".to_string(), json!(60))]))
            .unwrap();
        db.set_settings(&HashMap::from([("cache.ttl_secs".to_string(), json!(120))]))
            .unwrap();
        assert_eq!(db.get_all_settings().unwrap()["cache.ttl_secs"], json!(120));

        db.set_settings(&HashMap::from([(
            "cache.ttl_secs".to_string(),
            serde_json::Value::Null,
        )]))
        .unwrap();
        assert!(db.get_all_settings().unwrap().is_empty());
    }
}
