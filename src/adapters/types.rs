//! Normalized game data shapes shared by all source adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::fetch::FetchError;

/// Leagues the pipeline tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sport {
    Nba,
    Nfl,
    Mlb,
    Nhl,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Nba => "NBA",
            Sport::Nfl => "NFL",
            Sport::Mlb => "MLB",
            Sport::Nhl => "NHL",
        }
    }

    pub fn parse(s: &str) -> Option<Sport> {
        match s.to_ascii_uppercase().as_str() {
            "NBA" => Some(Sport::Nba),
            "NFL" => Some(Sport::Nfl),
            "MLB" => Some(Sport::Mlb),
            "NHL" => Some(Sport::Nhl),
            _ => None,
        }
    }

    pub fn all() -> [Sport; 4] {
        [Sport::Nba, Sport::Nfl, Sport::Mlb, Sport::Nhl]
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game lifecycle. The ordering is the legal transition order; a stored
/// status never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<GameStatus> {
        match s {
            "scheduled" => Some(GameStatus::Scheduled),
            "in_progress" => Some(GameStatus::InProgress),
            "final" => Some(GameStatus::Final),
            _ => None,
        }
    }
}

/// A normalized game score. `id` is unique per league regardless of which
/// upstream produced it; team ids carry the league prefix (`NBA_LAL`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScore {
    pub id: String,
    pub league: Sport,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_pts: u32,
    pub away_pts: u32,
    pub status: GameStatus,
    pub period: Option<u8>,
    pub time_remaining: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

/// Immutable team reference data, owned by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub league: Sport,
    pub code: String,
    pub name: String,
}

/// Per-player stat line inside a box score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatLine {
    pub player: String,
    pub points: u32,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamBoxLine {
    pub team_id: String,
    pub points: u32,
    pub players: Vec<StatLine>,
}

/// Detailed per-game stat lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxScore {
    pub event_id: String,
    pub league: Sport,
    pub home: TeamBoxLine,
    pub away: TeamBoxLine,
}

/// Query shape for recent-games lookups.
#[derive(Debug, Clone, Default)]
pub struct GameQuery {
    pub team_ids: Vec<String>,
    pub limit: usize,
}

/// Adapter failures. Always surfaced asynchronously; the scores agent treats
/// them as soft failures yielding an empty result.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse {league} upstream payload: {message}")]
    Parse { league: Sport, message: String },
    #[error("no box score found for event {event_id}")]
    NotFound { event_id: String },
}

impl AdapterError {
    pub fn parse(league: Sport, message: impl Into<String>) -> Self {
        AdapterError::Parse {
            league,
            message: message.into(),
        }
    }
}
