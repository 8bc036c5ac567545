//! In-memory store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;

use super::types::{GameStore, NewsArticle, NewsStore, PersistenceError};
use crate::adapters::{GameScore, Sport, Team};
use crate::dedup::DedupRecord;

/// Implements the storage traits over process-local maps, with the same
/// `(league, id)` keying and monotonic-status rule as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    games: DashMap<(Sport, String), GameScore>,
    teams: DashMap<(Sport, String), Team>,
    articles: DashMap<String, NewsArticle>,
    dedup_records: DashMap<String, DedupRecord>,
    fail_ids: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `create_game` fails for the given game ids, for
    /// exercising partial-failure paths.
    pub fn failing_for(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            fail_ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn seed_team(&self, team: Team) {
        self.teams.insert((team.league, team.code.clone()), team);
    }

    pub fn game(&self, league: Sport, id: &str) -> Option<GameScore> {
        self.games.get(&(league, id.to_string())).map(|g| g.clone())
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    pub fn dedup_record_count(&self) -> usize {
        self.dedup_records.len()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create_game(&self, game: &GameScore) -> Result<GameScore, PersistenceError> {
        if self.fail_ids.contains(&game.id) {
            return Err(PersistenceError::corrupt(
                format!("game {}:{}", game.league, game.id),
                "injected failure",
            ));
        }

        let key = (game.league, game.id.clone());
        let mut stored = game.clone();
        if let Some(existing) = self.games.get(&key) {
            if existing.status > stored.status {
                stored.status = existing.status;
            }
        }
        self.games.insert(key, stored.clone());
        Ok(stored)
    }

    async fn team(&self, league: Sport, code: &str) -> Result<Option<Team>, PersistenceError> {
        Ok(self
            .teams
            .get(&(league, code.to_string()))
            .map(|t| t.clone()))
    }

    async fn teams(&self, league: Sport) -> Result<Vec<Team>, PersistenceError> {
        let mut teams: Vec<Team> = self
            .teams
            .iter()
            .filter(|entry| entry.key().0 == league)
            .map(|entry| entry.value().clone())
            .collect();
        teams.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(teams)
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn add_article(&self, article: &NewsArticle) -> Result<bool, PersistenceError> {
        if self.articles.contains_key(&article.id) {
            return Ok(false);
        }
        self.articles.insert(article.id.clone(), article.clone());
        Ok(true)
    }

    async fn add_dedup_record(&self, record: &DedupRecord) -> Result<(), PersistenceError> {
        self.dedup_records
            .insert(record.content_id.clone(), record.clone());
        Ok(())
    }

    async fn dedup_records_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DedupRecord>, PersistenceError> {
        Ok(self
            .dedup_records
            .iter()
            .filter(|entry| entry.value().ingested_at >= cutoff)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::GameStatus;
    use chrono::Utc;

    fn game(id: &str, status: GameStatus) -> GameScore {
        GameScore {
            id: id.to_string(),
            league: Sport::Nhl,
            home_team_id: "NHL_BOS".to_string(),
            away_team_id: "NHL_NYR".to_string(),
            home_pts: 2,
            away_pts: 1,
            status,
            period: None,
            time_remaining: None,
            start_time: None,
            source: "test".to_string(),
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn status_never_moves_backwards() {
        let store = MemoryStore::new();
        store
            .create_game(&game("g1", GameStatus::Final))
            .await
            .unwrap();

        let persisted = store
            .create_game(&game("g1", GameStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(persisted.status, GameStatus::Final);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let store = MemoryStore::failing_for(["bad".to_string()]);
        assert!(store.create_game(&game("bad", GameStatus::Final)).await.is_err());
        assert!(store.create_game(&game("good", GameStatus::Final)).await.is_ok());
    }

    #[tokio::test]
    async fn seeded_teams_are_readable_through_the_store() {
        let store = MemoryStore::new();
        store.seed_team(Team {
            id: "NHL_BOS".to_string(),
            league: Sport::Nhl,
            code: "BOS".to_string(),
            name: "Boston".to_string(),
        });
        store.seed_team(Team {
            id: "NHL_NYR".to_string(),
            league: Sport::Nhl,
            code: "NYR".to_string(),
            name: "New York".to_string(),
        });

        let team = store.team(Sport::Nhl, "BOS").await.unwrap().unwrap();
        assert_eq!(team.id, "NHL_BOS");
        assert!(store.team(Sport::Nba, "BOS").await.unwrap().is_none());

        let teams = store.teams(Sport::Nhl).await.unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].code, "BOS");
    }

    #[tokio::test]
    async fn duplicate_articles_are_not_reinserted() {
        let store = MemoryStore::new();
        let article = NewsArticle {
            id: "a1".to_string(),
            title: "Title".to_string(),
            summary: "Summary".to_string(),
            category: crate::db::NewsCategory::General,
            published_at: Utc::now(),
            url: "https://example.com/a1".to_string(),
            team_id: None,
        };
        assert!(store.add_article(&article).await.unwrap());
        assert!(!store.add_article(&article).await.unwrap());
        assert_eq!(store.article_count(), 1);
    }
}
