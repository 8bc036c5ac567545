//! One fetch cycle per sport/mode: adapter call, persistence, cache write,
//! and change broadcast.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::adapters::{AdapterRegistry, GameQuery, GameScore, GameStatus, Sport};
use crate::broadcast::{BroadcastEvent, BroadcastHub};
use crate::cache::{scores_key, Cache};
use crate::config::PipelineConfig;
use crate::db::GameStore;
use crate::TARGET_SCHEDULER;

/// Days ahead a schedule-mode cycle looks.
const SCHEDULE_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    Featured,
    Live,
    Schedule,
}

impl CycleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleMode::Featured => "featured",
            CycleMode::Live => "live",
            CycleMode::Schedule => "schedule",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleRequest {
    pub sport: Sport,
    pub mode: CycleMode,
    pub limit: usize,
}

/// What one cycle accomplished. Soft failures show up as smaller counts,
/// never as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub sport: Sport,
    pub mode: CycleMode,
    pub fetched: usize,
    pub persisted: usize,
    pub events: usize,
}

/// Last score/status the agent saw per `(league, game id)`, for diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KnownState {
    home_pts: u32,
    away_pts: u32,
    status: GameStatus,
}

/// Orchestrates fetch cycles. One instance is shared by every polling job;
/// adapter and storage failures are contained inside the cycle.
pub struct ScoresAgent {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn GameStore>,
    cache: Arc<Cache>,
    hub: Arc<BroadcastHub>,
    cache_ttl: Duration,
    last_known: DashMap<(Sport, String), KnownState>,
}

impl ScoresAgent {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn GameStore>,
        cache: Arc<Cache>,
        hub: Arc<BroadcastHub>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            hub,
            cache_ttl: config.cache_ttl,
            last_known: DashMap::new(),
        }
    }

    /// Runs one cycle: fetch, persist, cache, broadcast.
    ///
    /// An adapter failure yields an empty outcome and is logged; a failed
    /// write for one game skips that game and the cycle continues. Only a
    /// misconfigured registry (no adapter for the sport) is an error.
    pub async fn run_once(&self, request: &CycleRequest) -> Result<CycleOutcome> {
        let adapter = self
            .registry
            .get(request.sport)
            .with_context(|| format!("no adapter registered for {}", request.sport))?;

        let fetched = match request.mode {
            CycleMode::Featured => {
                let query = GameQuery {
                    team_ids: Vec::new(),
                    limit: request.limit,
                };
                adapter.fetch_recent_games(&query).await
            }
            CycleMode::Live => adapter.fetch_live(&[]).await,
            CycleMode::Schedule => {
                let now = Utc::now();
                adapter
                    .fetch_schedule(&[], now, now + ChronoDuration::days(SCHEDULE_WINDOW_DAYS))
                    .await
            }
        };

        let games = match fetched {
            Ok(games) => games,
            Err(err) => {
                warn!(
                    target: TARGET_SCHEDULER,
                    "{} {} cycle failed upstream: {}", request.sport, request.mode.as_str(), err
                );
                return Ok(CycleOutcome {
                    sport: request.sport,
                    mode: request.mode,
                    fetched: 0,
                    persisted: 0,
                    events: 0,
                });
            }
        };
        let fetched_count = games.len();

        let mut persisted = Vec::with_capacity(games.len());
        for game in &games {
            match self.store.create_game(game).await {
                Ok(stored) => persisted.push(stored),
                Err(err) => {
                    warn!(
                        target: TARGET_SCHEDULER,
                        "Skipping game {}:{}; write failed: {}", game.league, game.id, err
                    );
                }
            }
        }

        let payload = serde_json::to_string(&persisted)
            .context("serializing score list for the cache")?;
        self.cache
            .set_ex(&scores_key(request.sport, request.mode.as_str()), payload, self.cache_ttl);

        let mut events = 0;
        for game in &persisted {
            events += self.publish_changes(game);
        }

        info!(
            target: TARGET_SCHEDULER,
            "{} {} cycle: fetched {}, persisted {}, events {}",
            request.sport,
            request.mode.as_str(),
            fetched_count,
            persisted.len(),
            events
        );
        Ok(CycleOutcome {
            sport: request.sport,
            mode: request.mode,
            fetched: fetched_count,
            persisted: persisted.len(),
            events,
        })
    }

    /// Diffs a persisted game against the last cycle's state and publishes
    /// score-update / status-change events. Status only ever moves forward;
    /// a regressed upstream status is ignored.
    fn publish_changes(&self, game: &GameScore) -> usize {
        let key = (game.league, game.id.clone());
        let previous = self.last_known.get(&key).map(|entry| *entry.value());

        let effective_status = match previous {
            Some(known) if known.status > game.status => known.status,
            _ => game.status,
        };

        let mut events = 0;
        match previous {
            None => {
                // First sighting: remember it without announcing anything.
            }
            Some(known) => {
                if known.home_pts != game.home_pts || known.away_pts != game.away_pts {
                    self.hub.broadcast(BroadcastEvent::ScoreUpdate { game: game.clone() });
                    events += 1;
                }
                if known.status != effective_status {
                    debug!(
                        target: TARGET_SCHEDULER,
                        "Game {}:{} moved {:?} -> {:?}", game.league, game.id, known.status, effective_status
                    );
                    self.hub.broadcast(BroadcastEvent::StatusChange {
                        game: game.clone(),
                        previous: known.status,
                    });
                    events += 1;
                }
            }
        }

        self.last_known.insert(
            key,
            KnownState {
                home_pts: game.home_pts,
                away_pts: game.away_pts,
                status: effective_status,
            },
        );
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DummyAdapter;
    use crate::db::MemoryStore;

    fn agent_with(store: Arc<MemoryStore>) -> ScoresAgent {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(DummyAdapter::new(Sport::Nba)));
        ScoresAgent::new(
            Arc::new(registry),
            store,
            Arc::new(Cache::new()),
            Arc::new(BroadcastHub::new()),
            &PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn missing_adapter_is_an_error() {
        let agent = agent_with(Arc::new(MemoryStore::new()));
        let request = CycleRequest {
            sport: Sport::Mlb,
            mode: CycleMode::Featured,
            limit: 2,
        };
        assert!(agent.run_once(&request).await.is_err());
    }

    #[tokio::test]
    async fn partial_write_failure_keeps_the_rest() {
        let store = Arc::new(MemoryStore::failing_for(["DUMMY-NBA-1".to_string()]));
        let agent = agent_with(Arc::clone(&store));
        let request = CycleRequest {
            sport: Sport::Nba,
            mode: CycleMode::Featured,
            limit: 3,
        };

        let outcome = agent.run_once(&request).await.unwrap();
        assert_eq!(outcome.fetched, 3);
        assert_eq!(outcome.persisted, 2);
        assert_eq!(store.game_count(), 2);
    }

    #[tokio::test]
    async fn repeat_cycle_with_same_scores_publishes_nothing() {
        let agent = agent_with(Arc::new(MemoryStore::new()));
        let request = CycleRequest {
            sport: Sport::Nba,
            mode: CycleMode::Featured,
            limit: 4,
        };

        let first = agent.run_once(&request).await.unwrap();
        assert_eq!(first.events, 0);

        let second = agent.run_once(&request).await.unwrap();
        // The dummy adapter is deterministic, so nothing changed.
        assert_eq!(second.events, 0);
    }
}
