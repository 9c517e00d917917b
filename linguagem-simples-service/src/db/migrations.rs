//! Database schema migrations.
//!
//! This module contains all database migrations and schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// This function is called during database initialization to ensure
/// the schema is up to date.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Settings overrides for the dynamic config
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- User ratings of simplified results
        CREATE TABLE IF NOT EXISTS feedback (
            id TEXT PRIMARY KEY,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment TEXT,
            result_hash TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_feedback_created ON feedback(created_at);

        -- One row per answered simplification request
        CREATE TABLE IF NOT EXISTS processing_history (
            id TEXT PRIMARY KEY,
            result_hash TEXT NOT NULL,
            source TEXT NOT NULL,
            original_chars INTEGER NOT NULL,
            simplified_chars INTEGER NOT NULL,
            reduction_percent REAL NOT NULL,
            model TEXT NOT NULL,
            cached INTEGER NOT NULL DEFAULT 0,
            used_ocr INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_created ON processing_history(created_at);
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: format!("Initial schema failed: {}", e),
    })?;

    run_history_provider_migration(conn)?;

    Ok(())
}

/// Record which provider served each request.
fn run_history_provider_migration(conn: &Connection) -> ServiceResult<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('processing_history') WHERE name='provider'",
            [],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )
        .map_err(DatabaseError::Query)?;

    if !has_column {
        conn.execute_batch("ALTER TABLE processing_history ADD COLUMN provider TEXT;")
            .map_err(|e| DatabaseError::Migration {
                message: format!("Adding processing_history.provider failed: {}", e),
            })?;
    }

    Ok(())
}
