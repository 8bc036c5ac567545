use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::core::Database;
use super::types::{GameStore, PersistenceError};
use crate::adapters::{GameScore, GameStatus, Sport, Team};
use crate::TARGET_DB;

#[derive(sqlx::FromRow)]
struct GameRow {
    id: String,
    league: String,
    home_team_id: String,
    away_team_id: String,
    home_pts: i64,
    away_pts: i64,
    status: String,
    period: Option<i64>,
    time_remaining: Option<String>,
    start_time: Option<String>,
    source: String,
    cached_at: String,
}

impl GameRow {
    fn into_game(self) -> Result<GameScore, PersistenceError> {
        let context = format!("game {}:{}", self.league, self.id);
        let league = Sport::parse(&self.league)
            .ok_or_else(|| PersistenceError::corrupt(&context, "unknown league"))?;
        let status = GameStatus::parse(&self.status)
            .ok_or_else(|| PersistenceError::corrupt(&context, "unknown status"))?;
        let cached_at = parse_timestamp(&self.cached_at)
            .ok_or_else(|| PersistenceError::corrupt(&context, "bad cached_at"))?;
        let start_time = match self.start_time.as_deref() {
            Some(raw) => Some(
                parse_timestamp(raw)
                    .ok_or_else(|| PersistenceError::corrupt(&context, "bad start_time"))?,
            ),
            None => None,
        };

        Ok(GameScore {
            id: self.id,
            league,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            home_pts: self.home_pts as u32,
            away_pts: self.away_pts as u32,
            status,
            period: self.period.map(|p| p as u8),
            time_remaining: self.time_remaining,
            start_time,
            source: self.source,
            cached_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Database {
    /// Upserts a game keyed by `(league, id)`. The status CASE keeps the
    /// stored status when the incoming one would move backwards
    /// (scheduled -> in_progress -> final only).
    pub async fn upsert_game(&self, game: &GameScore) -> Result<GameScore, PersistenceError> {
        debug!(target: TARGET_DB, "Upserting game {}:{}", game.league, game.id);

        let row = sqlx::query_as::<_, GameRow>(
            r#"
            INSERT INTO games (id, league, home_team_id, away_team_id, home_pts, away_pts,
                               status, period, time_remaining, start_time, source, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(league, id) DO UPDATE SET
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                home_pts = excluded.home_pts,
                away_pts = excluded.away_pts,
                status = CASE WHEN
                    (CASE excluded.status WHEN 'scheduled' THEN 0 WHEN 'in_progress' THEN 1 ELSE 2 END) >=
                    (CASE games.status WHEN 'scheduled' THEN 0 WHEN 'in_progress' THEN 1 ELSE 2 END)
                    THEN excluded.status ELSE games.status END,
                period = excluded.period,
                time_remaining = excluded.time_remaining,
                start_time = excluded.start_time,
                source = excluded.source,
                cached_at = excluded.cached_at
            RETURNING id, league, home_team_id, away_team_id, home_pts, away_pts,
                      status, period, time_remaining, start_time, source, cached_at
            "#,
        )
        .bind(&game.id)
        .bind(game.league.as_str())
        .bind(&game.home_team_id)
        .bind(&game.away_team_id)
        .bind(game.home_pts as i64)
        .bind(game.away_pts as i64)
        .bind(game.status.as_str())
        .bind(game.period.map(|p| p as i64))
        .bind(&game.time_remaining)
        .bind(game.start_time.map(|t| t.to_rfc3339()))
        .bind(&game.source)
        .bind(game.cached_at.to_rfc3339())
        .fetch_one(self.pool())
        .await?;

        row.into_game()
    }

    pub async fn game(
        &self,
        league: Sport,
        id: &str,
    ) -> Result<Option<GameScore>, PersistenceError> {
        let row = sqlx::query_as::<_, GameRow>(
            "SELECT id, league, home_team_id, away_team_id, home_pts, away_pts,
                    status, period, time_remaining, start_time, source, cached_at
             FROM games WHERE league = ?1 AND id = ?2",
        )
        .bind(league.as_str())
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(GameRow::into_game).transpose()
    }
}

#[async_trait]
impl GameStore for Database {
    async fn create_game(&self, game: &GameScore) -> Result<GameScore, PersistenceError> {
        self.upsert_game(game).await
    }

    async fn team(&self, league: Sport, code: &str) -> Result<Option<Team>, PersistenceError> {
        Database::team(self, league, code).await
    }

    async fn teams(&self, league: Sport) -> Result<Vec<Team>, PersistenceError> {
        Database::teams(self, league).await
    }
}
