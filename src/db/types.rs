//! Storage boundary types shared by the SQLite database and the in-memory
//! test store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{GameScore, Sport, Team};
use crate::dedup::DedupRecord;

/// Storage write/read failures. Callers treat a failed game write as a soft
/// failure: the record is skipped and the cycle continues.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row for {context} is malformed: {message}")]
    Corrupt { context: String, message: String },
}

impl PersistenceError {
    pub fn corrupt(context: impl Into<String>, message: impl Into<String>) -> Self {
        PersistenceError::Corrupt {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    Injuries,
    Roster,
    Trade,
    General,
}

impl NewsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Injuries => "injuries",
            NewsCategory::Roster => "roster",
            NewsCategory::Trade => "trade",
            NewsCategory::General => "general",
        }
    }
}

/// An ingested news/update article, optionally tied to one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: NewsCategory,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub team_id: Option<String>,
}

/// The only write path the pipeline depends on, plus read-only team lookups.
/// Production wiring uses [`super::Database`]; tests inject
/// [`super::MemoryStore`].
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Upserts a game keyed by `(league, id)` and returns the persisted row.
    /// A regressive status write keeps the stored status.
    async fn create_game(&self, game: &GameScore) -> Result<GameScore, PersistenceError>;

    async fn team(&self, league: Sport, code: &str) -> Result<Option<Team>, PersistenceError>;

    async fn teams(&self, league: Sport) -> Result<Vec<Team>, PersistenceError>;
}

/// Write path for ingested articles and their dedup signatures.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Inserts an article; returns false when the id was already stored.
    async fn add_article(&self, article: &NewsArticle) -> Result<bool, PersistenceError>;

    /// Persists one dedup record so the rolling index survives restarts.
    async fn add_dedup_record(&self, record: &DedupRecord) -> Result<(), PersistenceError>;

    /// Records ingested at or after `cutoff`, for rebuilding the index.
    async fn dedup_records_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DedupRecord>, PersistenceError>;
}
