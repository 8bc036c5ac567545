use super::core::Database;
use super::types::PersistenceError;
use crate::adapters::{Sport, Team};

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: String,
    league: String,
    code: String,
    name: String,
}

impl TeamRow {
    fn into_team(self) -> Result<Team, PersistenceError> {
        let league = Sport::parse(&self.league).ok_or_else(|| {
            PersistenceError::corrupt(format!("team {}", self.id), "unknown league")
        })?;
        Ok(Team {
            id: self.id,
            league,
            code: self.code,
            name: self.name,
        })
    }
}

// Team rows are reference data owned by the persistence collaborator; the
// pipeline only ever reads them.
impl Database {
    pub async fn team(&self, league: Sport, code: &str) -> Result<Option<Team>, PersistenceError> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, league, code, name FROM teams WHERE league = ?1 AND code = ?2",
        )
        .bind(league.as_str())
        .bind(code)
        .fetch_optional(self.pool())
        .await?;

        row.map(TeamRow::into_team).transpose()
    }

    pub async fn teams(&self, league: Sport) -> Result<Vec<Team>, PersistenceError> {
        let rows = sqlx::query_as::<_, TeamRow>(
            "SELECT id, league, code, name FROM teams WHERE league = ?1 ORDER BY code",
        )
        .bind(league.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TeamRow::into_team).collect()
    }
}
