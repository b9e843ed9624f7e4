//! Bucket store schema.
//!
//! Each step is applied inside its own transaction together with the row that
//! records it, so a crash never leaves a half-applied step behind.

use super::Error;
use tokio_rusqlite::{Connection, params};

struct Step {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step { version: 1, name: "buckets", sql: include_str!("../../migrations/001_buckets.sql") },
    Step { version: 2, name: "entry_size", sql: include_str!("../../migrations/002_entry_size.sql") },
];

/// Apply every step newer than the recorded schema version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_steps (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let applied: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_steps", [], |row| row.get(0))?;

        for step in STEPS.iter().filter(|s| s.version > applied) {
            let tx = conn.transaction()?;
            tx.execute_batch(step.sql)
                .map_err(|e| Error::MigrationFailed(format!("step {} ({}): {e}", step.version, step.name)))?;
            tx.execute(
                "INSERT INTO schema_steps (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![step.version, step.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version = step.version, name = step.name, "schema step applied");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Highest schema step recorded in the store.
pub async fn schema_version(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> {
        Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_steps", [], |row| row.get(0))?)
    })
    .await
    .map_err(Error::from)
}
