use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id TEXT NOT NULL,
                league TEXT NOT NULL,
                home_team_id TEXT NOT NULL,
                away_team_id TEXT NOT NULL,
                home_pts INTEGER NOT NULL,
                away_pts INTEGER NOT NULL,
                status TEXT NOT NULL,
                period INTEGER,
                time_remaining TEXT,
                start_time TEXT,
                source TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (league, id)
            );
            CREATE INDEX IF NOT EXISTS idx_games_league_status ON games (league, status);
            CREATE INDEX IF NOT EXISTS idx_games_start_time ON games (start_time);

            CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                league TEXT NOT NULL,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE (league, code)
            );
            CREATE INDEX IF NOT EXISTS idx_teams_league ON teams (league);

            CREATE TABLE IF NOT EXISTS news_articles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                category TEXT NOT NULL,
                published_at TEXT NOT NULL,
                url TEXT NOT NULL,
                team_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_news_articles_published_at ON news_articles (published_at);
            CREATE INDEX IF NOT EXISTS idx_news_articles_team_id ON news_articles (team_id);

            CREATE TABLE IF NOT EXISTS dedup_records (
                content_id TEXT PRIMARY KEY,
                signature TEXT NOT NULL,
                ingested_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_dedup_records_ingested_at ON dedup_records (ingested_at);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
