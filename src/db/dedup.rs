use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::core::Database;
use super::types::PersistenceError;
use crate::dedup::{DedupRecord, MinHashSignature};
use crate::TARGET_DB;

impl Database {
    /// Persists one dedup record so the rolling index survives restarts.
    pub async fn add_dedup_record(&self, record: &DedupRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO dedup_records (content_id, signature, ingested_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(content_id) DO UPDATE SET
                signature = excluded.signature,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&record.content_id)
        .bind(record.signature.serialize())
        .bind(record.ingested_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Loads every record ingested at or after `cutoff`, for rebuilding the
    /// in-memory index at startup. Rows with unreadable signatures are
    /// skipped with a warning rather than failing the load.
    pub async fn dedup_records_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DedupRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT content_id, signature, ingested_at
             FROM dedup_records WHERE ingested_at >= ?1",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(self.pool())
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (content_id, signature, ingested_at) in rows {
            let parsed_at = DateTime::parse_from_rfc3339(&ingested_at)
                .map(|dt| dt.with_timezone(&Utc))
                .ok();
            match (MinHashSignature::deserialize(&signature), parsed_at) {
                (Ok(signature), Some(ingested_at)) => records.push(DedupRecord {
                    content_id,
                    signature,
                    ingested_at,
                }),
                _ => {
                    warn!(target: TARGET_DB, "Skipping unreadable dedup record {}", content_id);
                }
            }
        }
        Ok(records)
    }

    /// Deletes records older than `cutoff`. Returns how many rows went away.
    pub async fn purge_dedup_records(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM dedup_records WHERE ingested_at < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(self.pool())
            .await?;

        let purged = result.rows_affected();
        debug!(target: TARGET_DB, "Purged {} dedup records", purged);
        Ok(purged)
    }
}
