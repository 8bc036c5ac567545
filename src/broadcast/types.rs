//! Wire shapes for the push side of the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::adapters::{GameScore, GameStatus, Sport, Team};
use crate::db::NewsArticle;

pub type ConnectionId = Uuid;

/// A delivery failure to one connection. Isolated per connection; the rest
/// of a fan-out is unaffected.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("connection {connection_id} is closed")]
    ClosedConnection { connection_id: ConnectionId },
}

/// What a connection wants to hear about. `None` fields match everything,
/// so `{sport: Some(Nba), team_id: None}` follows a whole league.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<Sport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn sport(sport: Sport) -> Self {
        Self {
            sport: Some(sport),
            team_id: None,
        }
    }

    pub fn team(team_id: impl Into<String>) -> Self {
        Self {
            sport: None,
            team_id: Some(team_id.into()),
        }
    }

    /// Whether an event for `sport` touching `team_ids` passes this filter.
    /// Events without a sport (league-agnostic news) only reach filters that
    /// don't name one.
    pub fn matches(&self, sport: Option<Sport>, team_ids: &[&str]) -> bool {
        if let Some(wanted) = self.sport {
            if sport != Some(wanted) {
                return false;
            }
        }
        if let Some(team_id) = &self.team_id {
            if !team_ids.iter().any(|t| t == team_id) {
                return false;
            }
        }
        true
    }
}

/// An event handed to the hub for fan-out.
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    ScoreUpdate { game: GameScore },
    StatusChange { game: GameScore, previous: GameStatus },
    NewsUpdate { article: NewsArticle },
}

impl BroadcastEvent {
    pub fn sport(&self) -> Option<Sport> {
        match self {
            BroadcastEvent::ScoreUpdate { game }
            | BroadcastEvent::StatusChange { game, .. } => Some(game.league),
            BroadcastEvent::NewsUpdate { .. } => None,
        }
    }

    pub fn team_ids(&self) -> Vec<&str> {
        match self {
            BroadcastEvent::ScoreUpdate { game }
            | BroadcastEvent::StatusChange { game, .. } => {
                vec![game.home_team_id.as_str(), game.away_team_id.as_str()]
            }
            BroadcastEvent::NewsUpdate { article } => {
                article.team_id.as_deref().into_iter().collect()
            }
        }
    }
}

/// Messages pushed to connections. Serializes as
/// `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    ScoreUpdate {
        game: GameScore,
    },
    StatusChange {
        game: GameScore,
        previous: GameStatus,
    },
    NewsUpdate {
        article: NewsArticle,
    },
    SubscriptionConfirmation {
        subscribed: bool,
        filter: SubscriptionFilter,
    },
    ConnectionStatus {
        connected: bool,
        connection_id: ConnectionId,
    },
    TeamsLoaded {
        teams: Vec<Team>,
    },
}

impl From<BroadcastEvent> for OutgoingMessage {
    fn from(event: BroadcastEvent) -> Self {
        match event {
            BroadcastEvent::ScoreUpdate { game } => OutgoingMessage::ScoreUpdate { game },
            BroadcastEvent::StatusChange { game, previous } => {
                OutgoingMessage::StatusChange { game, previous }
            }
            BroadcastEvent::NewsUpdate { article } => OutgoingMessage::NewsUpdate { article },
        }
    }
}

/// Subscription requests arriving from a connection: one team, or all of a
/// user's teams optionally scoped by sport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum IncomingMessage {
    Subscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sport: Option<Sport>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team_id: Option<String>,
    },
    Unsubscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sport: Option<Sport>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team_id: Option<String>,
    },
    SubscribeAll {
        teams: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sport: Option<Sport>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matching() {
        let league = SubscriptionFilter::sport(Sport::Nba);
        assert!(league.matches(Some(Sport::Nba), &["NBA_LAL", "NBA_BOS"]));
        assert!(!league.matches(Some(Sport::Nhl), &["NHL_BOS"]));
        assert!(!league.matches(None, &[]));

        let team = SubscriptionFilter::team("NBA_LAL");
        assert!(team.matches(Some(Sport::Nba), &["NBA_LAL", "NBA_BOS"]));
        assert!(!team.matches(Some(Sport::Nba), &["NBA_NYK", "NBA_BOS"]));

        let everything = SubscriptionFilter::default();
        assert!(everything.matches(Some(Sport::Mlb), &[]));
        assert!(everything.matches(None, &[]));
    }

    #[test]
    fn outgoing_messages_carry_type_and_payload() {
        let message = OutgoingMessage::SubscriptionConfirmation {
            subscribed: true,
            filter: SubscriptionFilter::team("NBA_LAL"),
        };
        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&message).unwrap(),
        )
        .unwrap();
        assert_eq!(json["type"], "subscription-confirmation");
        assert_eq!(json["payload"]["subscribed"], true);
        assert_eq!(json["payload"]["filter"]["teamId"], "NBA_LAL");
    }

    #[test]
    fn incoming_messages_parse() {
        let parsed: IncomingMessage = serde_json::from_str(
            r#"{"type": "subscribe-all", "payload": {"teams": ["NBA_LAL", "NBA_NYK"], "sport": "NBA"}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            IncomingMessage::SubscribeAll {
                teams: vec!["NBA_LAL".to_string(), "NBA_NYK".to_string()],
                sport: Some(Sport::Nba),
            }
        );
    }
}
