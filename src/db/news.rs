use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::core::Database;
use super::types::{NewsArticle, NewsStore, PersistenceError};
use crate::dedup::DedupRecord;
use crate::TARGET_DB;

impl Database {
    /// Inserts an article; an id seen before leaves the stored row untouched.
    pub async fn insert_article(&self, article: &NewsArticle) -> Result<bool, PersistenceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO news_articles (id, title, summary, category, published_at, url, team_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(article.category.as_str())
        .bind(article.published_at.to_rfc3339())
        .bind(&article.url)
        .bind(&article.team_id)
        .execute(self.pool())
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(target: TARGET_DB, "Article {} {}", article.id, if inserted { "stored" } else { "already present" });
        Ok(inserted)
    }
}

#[async_trait]
impl NewsStore for Database {
    async fn add_article(&self, article: &NewsArticle) -> Result<bool, PersistenceError> {
        self.insert_article(article).await
    }

    async fn add_dedup_record(&self, record: &DedupRecord) -> Result<(), PersistenceError> {
        Database::add_dedup_record(self, record).await
    }

    async fn dedup_records_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DedupRecord>, PersistenceError> {
        Database::dedup_records_since(self, cutoff).await
    }
}
