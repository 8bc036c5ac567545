//! MLB adapter: statsapi JSON schedule/linescore/boxscore feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::types::{
    AdapterError, BoxScore, GameQuery, GameScore, GameStatus, Sport, StatLine, TeamBoxLine,
};
use super::util::{map_status, namespaced_team_id, parse_start_time, team_code};
use super::SportAdapter;
use crate::fetch::EthicalFetcher;
use crate::TARGET_WEB_REQUEST;

const DEFAULT_BASE_URL: &str = "https://statsapi.mlb.com/api/v1";

pub struct MlbAdapter {
    fetcher: Arc<EthicalFetcher>,
    base_url: String,
}

impl MlbAdapter {
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

#[derive(Deserialize)]
struct RawScheduleEnvelope {
    #[serde(default)]
    dates: Vec<RawDate>,
}

#[derive(Deserialize)]
struct RawDate {
    #[serde(default)]
    games: Vec<RawGame>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGame {
    game_pk: u64,
    #[serde(default)]
    game_date: Option<String>,
    status: RawStatus,
    teams: RawMatchup,
    #[serde(default)]
    linescore: Option<RawLinescore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    #[serde(default)]
    abstract_game_state: Option<String>,
    #[serde(default)]
    detailed_state: Option<String>,
}

#[derive(Deserialize)]
struct RawMatchup {
    home: RawSide,
    away: RawSide,
}

#[derive(Deserialize)]
struct RawSide {
    #[serde(default)]
    score: Option<u32>,
    team: RawTeamRef,
}

#[derive(Deserialize)]
struct RawTeamRef {
    #[serde(default)]
    abbreviation: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLinescore {
    #[serde(default)]
    current_inning: Option<u8>,
    #[serde(default)]
    inning_state: Option<String>,
}

#[derive(Deserialize)]
struct RawBoxScoreEnvelope {
    teams: RawBoxTeams,
}

#[derive(Deserialize)]
struct RawBoxTeams {
    home: RawBoxSide,
    away: RawBoxSide,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBoxSide {
    team: RawTeamRef,
    #[serde(default)]
    team_stats: Option<RawTeamStats>,
    #[serde(default)]
    players: HashMap<String, RawBoxPlayer>,
}

#[derive(Deserialize)]
struct RawTeamStats {
    #[serde(default)]
    batting: Option<RawBatting>,
}

#[derive(Deserialize)]
struct RawBatting {
    #[serde(default)]
    runs: Option<u32>,
    #[serde(default)]
    hits: Option<u32>,
}

#[derive(Deserialize)]
struct RawBoxPlayer {
    person: RawPerson,
    #[serde(default)]
    stats: Option<RawTeamStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPerson {
    full_name: String,
}

/// The abbreviation when the feed carries one, otherwise a code derived from
/// the team name ("Los Angeles Dodgers" -> "LAD"-style initials).
fn side_code(team: &RawTeamRef) -> String {
    if let Some(abbr) = team.abbreviation.as_deref().filter(|a| !a.is_empty()) {
        return abbr.to_string();
    }
    team.name
        .as_deref()
        .unwrap_or("UNK")
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn game_status(raw: &RawGame) -> GameStatus {
    match raw.status.abstract_game_state.as_deref() {
        Some("Preview") => GameStatus::Scheduled,
        Some("Live") => GameStatus::InProgress,
        Some("Final") => GameStatus::Final,
        _ => map_status(raw.status.detailed_state.as_deref().unwrap_or("")),
    }
}

fn normalize_game(raw: &RawGame) -> GameScore {
    let linescore = raw.linescore.as_ref();
    GameScore {
        id: raw.game_pk.to_string(),
        league: Sport::Mlb,
        home_team_id: namespaced_team_id(Sport::Mlb, &side_code(&raw.teams.home.team)),
        away_team_id: namespaced_team_id(Sport::Mlb, &side_code(&raw.teams.away.team)),
        home_pts: raw.teams.home.score.unwrap_or(0),
        away_pts: raw.teams.away.score.unwrap_or(0),
        status: game_status(raw),
        period: linescore.and_then(|l| l.current_inning),
        time_remaining: linescore.and_then(|l| {
            l.inning_state
                .as_ref()
                .zip(l.current_inning)
                .map(|(state, inning)| format!("{} {}", state, inning))
        }),
        start_time: raw.game_date.as_deref().and_then(parse_start_time),
        source: "mlb-statsapi".to_string(),
        cached_at: Utc::now(),
    }
}

fn parse_schedule(body: &str) -> Result<Vec<GameScore>, AdapterError> {
    let envelope: RawScheduleEnvelope = serde_json::from_str(body)
        .map_err(|e| AdapterError::parse(Sport::Mlb, e.to_string()))?;
    Ok(envelope
        .dates
        .iter()
        .flat_map(|d| d.games.iter())
        .map(normalize_game)
        .collect())
}

fn parse_box_score(body: &str, event_id: &str) -> Result<BoxScore, AdapterError> {
    let envelope: RawBoxScoreEnvelope = serde_json::from_str(body)
        .map_err(|e| AdapterError::parse(Sport::Mlb, e.to_string()))?;

    let team_line = |side: &RawBoxSide| {
        let batting = side
            .team_stats
            .as_ref()
            .and_then(|s| s.batting.as_ref());
        let mut players: Vec<StatLine> = side
            .players
            .values()
            .map(|p| {
                let batting = p.stats.as_ref().and_then(|s| s.batting.as_ref());
                StatLine {
                    player: p.person.full_name.clone(),
                    points: batting.and_then(|b| b.runs).unwrap_or(0),
                    detail: batting
                        .and_then(|b| b.hits)
                        .map(|h| format!("{} hits", h)),
                }
            })
            .collect();
        players.sort_by(|a, b| a.player.cmp(&b.player));

        TeamBoxLine {
            team_id: namespaced_team_id(Sport::Mlb, &side_code(&side.team)),
            points: batting.and_then(|b| b.runs).unwrap_or(0),
            players,
        }
    };

    Ok(BoxScore {
        event_id: event_id.to_string(),
        league: Sport::Mlb,
        home: team_line(&envelope.teams.home),
        away: team_line(&envelope.teams.away),
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
impl SportAdapter for MlbAdapter {
    fn sport(&self) -> Sport {
        Sport::Mlb
    }

    async fn fetch_recent_games(&self, query: &GameQuery) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/schedule?sportId=1&hydrate=linescore", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        let mut games: Vec<GameScore> = parse_schedule(&body)?
            .into_iter()
            .filter(|g| matches_team_filter(g, &query.team_ids))
            .collect();
        games.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if query.limit > 0 {
            games.truncate(query.limit);
        }
        debug!(target: TARGET_WEB_REQUEST, "MLB recent games: {}", games.len());
        Ok(games)
    }

    async fn fetch_live(&self, team_codes: &[String]) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/schedule?sportId=1&hydrate=linescore", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        Ok(parse_schedule(&body)?
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
        let url = format!(
            "{}/schedule?sportId=1&startDate={}&endDate={}",
            self.base_url,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
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
        let url = format!("{}/game/{}/boxscore", self.base_url, event_id);
        let body = self.fetcher.fetch(&url).await?;
        parse_box_score(&body, event_id)
    }
}
