//! Subscription registry and push fan-out for score/status/news events.

mod types;

pub use self::types::{
    BroadcastError, BroadcastEvent, ConnectionId, IncomingMessage, OutgoingMessage,
    SubscriptionFilter,
};

use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::{Sport, Team};
use crate::TARGET_BROADCAST;

/// Fans events out to every connection with a matching subscription.
///
/// Delivery is at-least-once best-effort: a send to a closed connection is
/// logged and that connection dropped, without affecting the rest. All
/// subscription state for a connection is cleared when it disconnects.
#[derive(Default)]
pub struct BroadcastHub {
    connections: DashMap<ConnectionId, UnboundedSender<OutgoingMessage>>,
    subscriptions: DashMap<ConnectionId, HashSet<SubscriptionFilter>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and hands back its message stream. The
    /// first message on the stream is the connection-status greeting.
    pub fn register(&self) -> (ConnectionId, UnboundedReceiver<OutgoingMessage>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver end is still in hand, so this send cannot fail.
        let _ = tx.send(OutgoingMessage::ConnectionStatus {
            connected: true,
            connection_id,
        });
        self.connections.insert(connection_id, tx);
        debug!(target: TARGET_BROADCAST, "Connection {} registered", connection_id);
        (connection_id, rx)
    }

    /// Drops the connection's sink and clears all its subscriptions.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        self.subscriptions.remove(&connection_id);
        debug!(target: TARGET_BROADCAST, "Connection {} disconnected", connection_id);
    }

    pub fn subscribe(&self, connection_id: ConnectionId, filter: SubscriptionFilter) {
        self.subscriptions
            .entry(connection_id)
            .or_default()
            .insert(filter.clone());
        self.confirm(connection_id, true, filter);
    }

    pub fn unsubscribe(&self, connection_id: ConnectionId, filter: SubscriptionFilter) {
        if let Some(mut filters) = self.subscriptions.get_mut(&connection_id) {
            filters.remove(&filter);
        }
        self.confirm(connection_id, false, filter);
    }

    /// Subscribes a connection to all of a user's teams, optionally scoped
    /// to one sport, and confirms with the team list that was loaded.
    pub fn subscribe_all(
        &self,
        connection_id: ConnectionId,
        teams: &[Team],
        sport: Option<Sport>,
    ) {
        let selected: Vec<&Team> = teams
            .iter()
            .filter(|t| sport.map(|s| t.league == s).unwrap_or(true))
            .collect();

        {
            let mut filters = self.subscriptions.entry(connection_id).or_default();
            for team in &selected {
                filters.insert(SubscriptionFilter::team(team.id.clone()));
            }
        }

        if let Err(err) = self.push(
            connection_id,
            OutgoingMessage::TeamsLoaded {
                teams: selected.into_iter().cloned().collect(),
            },
        ) {
            warn!(target: TARGET_BROADCAST, "{}", err);
        }
    }

    /// Delivers `event` to every connection with a matching subscription and
    /// returns how many received it. A failed delivery disconnects only the
    /// connection that failed.
    pub fn broadcast(&self, event: BroadcastEvent) -> usize {
        let sport = event.sport();
        let team_ids = event.team_ids();

        let interested: Vec<ConnectionId> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().iter().any(|f| f.matches(sport, &team_ids)))
            .map(|entry| *entry.key())
            .collect();

        let message: OutgoingMessage = event.into();
        let mut delivered = 0;
        for connection_id in interested {
            match self.push(connection_id, message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(target: TARGET_BROADCAST, "{}; dropping connection", err);
                    self.disconnect(connection_id);
                }
            }
        }
        debug!(
            target: TARGET_BROADCAST,
            "Delivered {:?} to {} connections", message, delivered
        );
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Active subscription filters for one connection.
    pub fn subscriptions_of(&self, connection_id: ConnectionId) -> Vec<SubscriptionFilter> {
        self.subscriptions
            .get(&connection_id)
            .map(|filters| filters.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies one incoming subscription message. `user_teams` backs the
    /// subscribe-all form.
    pub fn handle(
        &self,
        connection_id: ConnectionId,
        message: IncomingMessage,
        user_teams: &[Team],
    ) {
        match message {
            IncomingMessage::Subscribe { sport, team_id } => {
                self.subscribe(connection_id, SubscriptionFilter { sport, team_id });
            }
            IncomingMessage::Unsubscribe { sport, team_id } => {
                self.unsubscribe(connection_id, SubscriptionFilter { sport, team_id });
            }
            IncomingMessage::SubscribeAll { teams, sport } => {
                let selected: Vec<Team> = user_teams
                    .iter()
                    .filter(|t| teams.iter().any(|id| *id == t.id || *id == t.code))
                    .cloned()
                    .collect();
                self.subscribe_all(connection_id, &selected, sport);
            }
        }
    }

    fn confirm(&self, connection_id: ConnectionId, subscribed: bool, filter: SubscriptionFilter) {
        if let Err(err) = self.push(
            connection_id,
            OutgoingMessage::SubscriptionConfirmation { subscribed, filter },
        ) {
            warn!(target: TARGET_BROADCAST, "{}", err);
        }
    }

    fn push(
        &self,
        connection_id: ConnectionId,
        message: OutgoingMessage,
    ) -> Result<(), BroadcastError> {
        let Some(sender) = self.connections.get(&connection_id) else {
            return Err(BroadcastError::ClosedConnection { connection_id });
        };
        sender
            .send(message)
            .map_err(|_| BroadcastError::ClosedConnection { connection_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{GameScore, GameStatus, Sport};
    use chrono::Utc;

    fn game(league: Sport, home: &str, away: &str) -> GameScore {
        GameScore {
            id: "g1".to_string(),
            league,
            home_team_id: home.to_string(),
            away_team_id: away.to_string(),
            home_pts: 3,
            away_pts: 2,
            status: GameStatus::InProgress,
            period: Some(2),
            time_remaining: Some("5:00".to_string()),
            start_time: None,
            source: "test".to_string(),
            cached_at: Utc::now(),
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<OutgoingMessage>) -> Vec<OutgoingMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn register_greets_with_connection_status() {
        let hub = BroadcastHub::new();
        let (connection_id, mut rx) = hub.register();
        assert_eq!(
            rx.try_recv().unwrap(),
            OutgoingMessage::ConnectionStatus {
                connected: true,
                connection_id,
            }
        );
    }

    #[tokio::test]
    async fn broadcast_reaches_matching_subscribers_only() {
        let hub = BroadcastHub::new();
        let (nba_conn, mut nba_rx) = hub.register();
        let (nhl_conn, mut nhl_rx) = hub.register();
        hub.subscribe(nba_conn, SubscriptionFilter::sport(Sport::Nba));
        hub.subscribe(nhl_conn, SubscriptionFilter::sport(Sport::Nhl));
        drain(&mut nba_rx);
        drain(&mut nhl_rx);

        let delivered = hub.broadcast(BroadcastEvent::ScoreUpdate {
            game: game(Sport::Nba, "NBA_LAL", "NBA_BOS"),
        });

        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut nba_rx).len(), 1);
        assert!(drain(&mut nhl_rx).is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_isolated() {
        let hub = BroadcastHub::new();
        let (dead_conn, dead_rx) = hub.register();
        let (live_conn, mut live_rx) = hub.register();
        hub.subscribe(dead_conn, SubscriptionFilter::team("NBA_LAL"));
        hub.subscribe(live_conn, SubscriptionFilter::team("NBA_LAL"));
        drain(&mut live_rx);
        drop(dead_rx);

        let delivered = hub.broadcast(BroadcastEvent::ScoreUpdate {
            game: game(Sport::Nba, "NBA_LAL", "NBA_BOS"),
        });

        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut live_rx).len(), 1);
        // The dead connection was reaped.
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_clears_subscriptions() {
        let hub = BroadcastHub::new();
        let (connection_id, _rx) = hub.register();
        hub.subscribe(connection_id, SubscriptionFilter::sport(Sport::Mlb));
        hub.disconnect(connection_id);

        assert!(hub.subscriptions_of(connection_id).is_empty());
        assert_eq!(
            hub.broadcast(BroadcastEvent::ScoreUpdate {
                game: game(Sport::Mlb, "MLB_NYY", "MLB_BOS"),
            }),
            0
        );
    }

    #[tokio::test]
    async fn unsubscribe_removes_one_filter() {
        let hub = BroadcastHub::new();
        let (connection_id, mut rx) = hub.register();
        hub.subscribe(connection_id, SubscriptionFilter::team("NHL_BOS"));
        hub.subscribe(connection_id, SubscriptionFilter::team("NHL_NYR"));
        hub.unsubscribe(connection_id, SubscriptionFilter::team("NHL_BOS"));
        drain(&mut rx);

        assert_eq!(
            hub.broadcast(BroadcastEvent::ScoreUpdate {
                game: game(Sport::Nhl, "NHL_BOS", "NHL_MTL"),
            }),
            0
        );
        assert_eq!(
            hub.broadcast(BroadcastEvent::ScoreUpdate {
                game: game(Sport::Nhl, "NHL_NYR", "NHL_MTL"),
            }),
            1
        );
    }

    #[tokio::test]
    async fn subscribe_all_scopes_by_sport() {
        let hub = BroadcastHub::new();
        let (connection_id, mut rx) = hub.register();
        let teams = vec![
            Team {
                id: "NBA_NYK".to_string(),
                league: Sport::Nba,
                code: "NYK".to_string(),
                name: "New York".to_string(),
            },
            Team {
                id: "NHL_NYR".to_string(),
                league: Sport::Nhl,
                code: "NYR".to_string(),
                name: "New York".to_string(),
            },
        ];

        hub.subscribe_all(connection_id, &teams, Some(Sport::Nba));

        let filters = hub.subscriptions_of(connection_id);
        assert_eq!(filters, vec![SubscriptionFilter::team("NBA_NYK")]);

        let messages = drain(&mut rx);
        assert!(matches!(
            messages.last(),
            Some(OutgoingMessage::TeamsLoaded { teams }) if teams.len() == 1
        ));
    }
}
