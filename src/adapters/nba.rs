//! NBA adapter: JSON scoreboard/schedule/boxscore feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::types::{
    AdapterError, BoxScore, GameQuery, GameScore, GameStatus, Sport, StatLine, TeamBoxLine,
};
use super::util::{map_status, namespaced_team_id, parse_start_time, team_code};
use super::SportAdapter;
use crate::fetch::EthicalFetcher;
use crate::TARGET_WEB_REQUEST;

const DEFAULT_BASE_URL: &str = "https://cdn.nba.com/static/json/liveData";

pub struct NbaAdapter {
    fetcher: Arc<EthicalFetcher>,
    base_url: String,
}

impl NbaAdapter {
    pub fn new(fetcher: Arc<EthicalFetcher>) -> Self {
        Self::with_base_url(fetcher, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(fetcher: Arc<EthicalFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }
}

// Raw feed shapes. Only the fields the normalization needs are declared;
// everything else in the payload is ignored.

#[derive(Deserialize)]
struct RawScoreboardEnvelope {
    scoreboard: RawScoreboard,
}

#[derive(Deserialize)]
struct RawScoreboard {
    #[serde(default)]
    games: Vec<RawGame>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGame {
    game_id: String,
    #[serde(default)]
    game_status: Option<u8>,
    #[serde(default)]
    game_status_text: Option<String>,
    #[serde(default)]
    period: Option<u8>,
    #[serde(default)]
    game_clock: Option<String>,
    #[serde(rename = "gameTimeUTC", default)]
    game_time_utc: Option<String>,
    home_team: RawTeam,
    away_team: RawTeam,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTeam {
    team_tricode: String,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    players: Vec<RawPlayer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlayer {
    name: String,
    #[serde(default)]
    statistics: RawPlayerStats,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawPlayerStats {
    #[serde(default)]
    points: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScheduleEnvelope {
    league_schedule: RawLeagueSchedule,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLeagueSchedule {
    #[serde(default)]
    game_dates: Vec<RawGameDate>,
}

#[derive(Deserialize)]
struct RawGameDate {
    #[serde(default)]
    games: Vec<RawGame>,
}

#[derive(Deserialize)]
struct RawBoxScoreEnvelope {
    game: RawGame,
}

/// Converts the feed's numeric status (1 scheduled, 2 live, 3 final) with the
/// status text as fallback.
fn game_status(raw: &RawGame) -> GameStatus {
    match raw.game_status {
        Some(1) => GameStatus::Scheduled,
        Some(2) => GameStatus::InProgress,
        Some(3) => GameStatus::Final,
        _ => map_status(raw.game_status_text.as_deref().unwrap_or("")),
    }
}

/// Turns the feed's ISO-8601 duration clock ("PT02M31.00S") into "2:31".
fn normalize_clock(raw: Option<&str>) -> Option<String> {
    let raw = raw?.strip_prefix("PT")?;
    let (minutes, rest) = raw.split_once('M')?;
    let seconds = rest.split('.').next()?.trim_end_matches('S');
    let minutes: u32 = minutes.parse().ok()?;
    Some(format!("{}:{:0>2}", minutes, seconds))
}

fn normalize_game(raw: &RawGame) -> GameScore {
    GameScore {
        id: raw.game_id.clone(),
        league: Sport::Nba,
        home_team_id: namespaced_team_id(Sport::Nba, &raw.home_team.team_tricode),
        away_team_id: namespaced_team_id(Sport::Nba, &raw.away_team.team_tricode),
        home_pts: raw.home_team.score.unwrap_or(0),
        away_pts: raw.away_team.score.unwrap_or(0),
        status: game_status(raw),
        period: raw.period.filter(|p| *p > 0),
        time_remaining: normalize_clock(raw.game_clock.as_deref()),
        start_time: raw.game_time_utc.as_deref().and_then(parse_start_time),
        source: "nba-cdn".to_string(),
        cached_at: Utc::now(),
    }
}

fn parse_scoreboard(body: &str) -> Result<Vec<GameScore>, AdapterError> {
    let envelope: RawScoreboardEnvelope = serde_json::from_str(body)
        .map_err(|e| AdapterError::parse(Sport::Nba, e.to_string()))?;
    Ok(envelope.scoreboard.games.iter().map(normalize_game).collect())
}

fn parse_schedule(body: &str) -> Result<Vec<GameScore>, AdapterError> {
    let envelope: RawScheduleEnvelope = serde_json::from_str(body)
        .map_err(|e| AdapterError::parse(Sport::Nba, e.to_string()))?;
    Ok(envelope
        .league_schedule
        .game_dates
        .iter()
        .flat_map(|d| d.games.iter())
        .map(normalize_game)
        .collect())
}

fn parse_box_score(body: &str, event_id: &str) -> Result<BoxScore, AdapterError> {
    let envelope: RawBoxScoreEnvelope = serde_json::from_str(body)
        .map_err(|e| AdapterError::parse(Sport::Nba, e.to_string()))?;
    let game = envelope.game;

    let team_line = |team: &RawTeam| TeamBoxLine {
        team_id: namespaced_team_id(Sport::Nba, &team.team_tricode),
        points: team.score.unwrap_or(0),
        players: team
            .players
            .iter()
            .map(|p| StatLine {
                player: p.name.clone(),
                points: p.statistics.points,
                detail: None,
            })
            .collect(),
    };

    Ok(BoxScore {
        event_id: event_id.to_string(),
        league: Sport::Nba,
        home: team_line(&game.home_team),
        away: team_line(&game.away_team),
    })
}

fn matches_team_filter(game: &GameScore, codes: &[String]) -> bool {
    if codes.is_empty() {
        return true;
    }
    codes.iter().any(|c| {
        let code = team_code(c);
        team_code(&game.home_team_id).eq_ignore_ascii_case(code)
            || team_code(&game.away_team_id).eq_ignore_ascii_case(code)
    })
}

#[async_trait]
impl SportAdapter for NbaAdapter {
    fn sport(&self) -> Sport {
        Sport::Nba
    }

    async fn fetch_recent_games(&self, query: &GameQuery) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scoreboard/todaysScoreboard_00.json", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        let mut games: Vec<GameScore> = parse_scoreboard(&body)?
            .into_iter()
            .filter(|g| matches_team_filter(g, &query.team_ids))
            .collect();
        games.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if query.limit > 0 {
            games.truncate(query.limit);
        }
        debug!(target: TARGET_WEB_REQUEST, "NBA recent games: {}", games.len());
        Ok(games)
    }

    async fn fetch_live(&self, team_codes: &[String]) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scoreboard/todaysScoreboard_00.json", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        Ok(parse_scoreboard(&body)?
            .into_iter()
            .filter(|g| g.status != GameStatus::Scheduled)
            .filter(|g| matches_team_filter(g, team_codes))
            .collect())
    }

    async fn fetch_schedule(
        &self,
        team_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scheduleLeagueV2.json", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        Ok(parse_schedule(&body)?
            .into_iter()
            .filter(|g| {
                g.start_time
                    .map(|t| t >= start && t <= end)
                    .unwrap_or(false)
            })
            .filter(|g| matches_team_filter(g, team_ids))
            .collect())
    }

    async fn fetch_box_score(&self, event_id: &str) -> Result<BoxScore, AdapterError> {
        let url = format!("{}/boxscore/boxscore_{}.json", self.base_url, event_id);
        let body = self.fetcher.fetch(&url).await?;
        parse_box_score(&body, event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOREBOARD_FIXTURE: &str = r#"{
        "scoreboard": {
            "games": [
                {
                    "gameId": "0022500101",
                    "gameStatus": 2,
                    "gameStatusText": "Q4 2:31",
                    "period": 4,
                    "gameClock": "PT02M31.00S",
                    "gameTimeUTC": "2026-02-01T00:30:00Z",
                    "homeTeam": {"teamTricode": "LAL", "score": 102},
                    "awayTeam": {"teamTricode": "BOS", "score": 99}
                },
                {
                    "gameId": "0022500102",
                    "gameStatus": 1,
                    "gameStatusText": "7:30 pm ET",
                    "gameTimeUTC": "2026-02-01T02:00:00Z",
                    "homeTeam": {"teamTricode": "NYK"},
                    "awayTeam": {"teamTricode": "MIA"}
                }
            ]
        }
    }"#;

    #[test]
    fn scoreboard_normalizes_to_game_scores() {
        let games = parse_scoreboard(SCOREBOARD_FIXTURE).unwrap();
        assert_eq!(games.len(), 2);

        let live = &games[0];
        assert_eq!(live.id, "0022500101");
        assert_eq!(live.home_team_id, "NBA_LAL");
        assert_eq!(live.away_team_id, "NBA_BOS");
        assert_eq!(live.home_pts, 102);
        assert_eq!(live.status, GameStatus::InProgress);
        assert_eq!(live.period, Some(4));
        assert_eq!(live.time_remaining.as_deref(), Some("2:31"));

        let upcoming = &games[1];
        assert_eq!(upcoming.status, GameStatus::Scheduled);
        assert_eq!(upcoming.home_pts, 0);
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let result = parse_scoreboard("{\"unexpected\": true}");
        assert!(matches!(result, Err(AdapterError::Parse { .. })));
    }

    #[test]
    fn iso_clock_normalizes() {
        assert_eq!(normalize_clock(Some("PT02M31.00S")).as_deref(), Some("2:31"));
        assert_eq!(normalize_clock(Some("PT11M05.00S")).as_deref(), Some("11:05"));
        assert_eq!(normalize_clock(None), None);
        assert_eq!(normalize_clock(Some("garbage")), None);
    }
}
