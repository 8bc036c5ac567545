//! Deterministic adapter used by tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::types::{
    AdapterError, BoxScore, GameQuery, GameScore, GameStatus, Sport, StatLine, TeamBoxLine,
};
use super::util::namespaced_team_id;
use super::SportAdapter;

const TEAM_CODES: [&str; 6] = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF"];

/// Produces the same games for the same inputs on every call; no network,
/// no clock dependence beyond a fixed epoch.
pub struct DummyAdapter {
    sport: Sport,
    games_per_call: usize,
}

impl DummyAdapter {
    pub fn new(sport: Sport) -> Self {
        Self {
            sport,
            games_per_call: 4,
        }
    }

    pub fn with_game_count(sport: Sport, games_per_call: usize) -> Self {
        Self {
            sport,
            games_per_call,
        }
    }

    fn fixed_epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 19, 0, 0).unwrap()
    }

    fn game(&self, index: usize) -> GameScore {
        let home = TEAM_CODES[index % TEAM_CODES.len()];
        let away = TEAM_CODES[(index + 1) % TEAM_CODES.len()];
        let status = match index % 3 {
            0 => GameStatus::InProgress,
            1 => GameStatus::Final,
            _ => GameStatus::Scheduled,
        };

        GameScore {
            id: format!("DUMMY-{}-{}", self.sport.as_str(), index + 1),
            league: self.sport,
            home_team_id: namespaced_team_id(self.sport, home),
            away_team_id: namespaced_team_id(self.sport, away),
            home_pts: (90 + index * 7) as u32,
            away_pts: (88 + index * 5) as u32,
            status,
            period: (status == GameStatus::InProgress).then_some(4),
            time_remaining: (status == GameStatus::InProgress).then(|| "2:31".to_string()),
            start_time: Some(Self::fixed_epoch() - Duration::hours(index as i64)),
            source: "dummy".to_string(),
            cached_at: Self::fixed_epoch(),
        }
    }

    fn games(&self, count: usize) -> Vec<GameScore> {
        (0..count).map(|i| self.game(i)).collect()
    }
}

#[async_trait]
impl SportAdapter for DummyAdapter {
    fn sport(&self) -> Sport {
        self.sport
    }

    async fn fetch_recent_games(&self, query: &GameQuery) -> Result<Vec<GameScore>, AdapterError> {
        let count = if query.limit > 0 {
            query.limit.min(self.games_per_call)
        } else {
            self.games_per_call
        };
        Ok(self.games(count))
    }

    async fn fetch_live(&self, team_codes: &[String]) -> Result<Vec<GameScore>, AdapterError> {
        Ok(self
            .games(self.games_per_call)
            .into_iter()
            .filter(|g| g.status == GameStatus::InProgress)
            .filter(|g| {
                team_codes.is_empty()
                    || team_codes
                        .iter()
                        .any(|c| g.home_team_id.ends_with(c) || g.away_team_id.ends_with(c))
            })
            .collect())
    }

    async fn fetch_schedule(
        &self,
        _team_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GameScore>, AdapterError> {
        Ok(self
            .games(self.games_per_call)
            .into_iter()
            .filter(|g| g.status == GameStatus::Scheduled)
            .filter(|g| {
                g.start_time
                    .map(|t| t >= start && t <= end)
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn fetch_box_score(&self, event_id: &str) -> Result<BoxScore, AdapterError> {
        let game = self.game(0);
        Ok(BoxScore {
            event_id: event_id.to_string(),
            league: self.sport,
            home: TeamBoxLine {
                team_id: game.home_team_id,
                points: game.home_pts,
                players: vec![StatLine {
                    player: "Home Star".to_string(),
                    points: 30,
                    detail: None,
                }],
            },
            away: TeamBoxLine {
                team_id: game.away_team_id,
                points: game.away_pts,
                players: vec![StatLine {
                    player: "Away Star".to_string(),
                    points: 28,
                    detail: None,
                }],
            },
        })
    }
}
