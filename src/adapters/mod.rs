//! Source adapters for the tracked leagues.
//!
//! Each adapter implements the same capability contract over the ethical
//! fetcher and converges on the normalized [`GameScore`] shape; parsing is
//! where they differ (JSON feeds for NBA/MLB, scraped HTML for NFL/NHL).

mod dummy;
mod mlb;
mod nba;
mod nfl;
mod nhl;
mod types;
mod util;

pub use self::dummy::DummyAdapter;
pub use self::mlb::MlbAdapter;
pub use self::nba::NbaAdapter;
pub use self::nfl::NflAdapter;
pub use self::nhl::NhlAdapter;
pub use self::types::*;
pub use self::util::{map_status, namespaced_team_id, parse_period_clock, parse_start_time, team_code};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::fetch::EthicalFetcher;

/// The uniform capability contract every league adapter implements.
///
/// All four operations are async and must not panic; any failure surfaces
/// as an `Err` that the scores agent treats as a soft failure. An empty
/// `team_codes` filter on [`fetch_live`](SportAdapter::fetch_live) means all
/// tracked teams.
#[async_trait]
pub trait SportAdapter: Send + Sync {
    fn sport(&self) -> Sport;

    /// Recent games for the given teams, most recent first.
    async fn fetch_recent_games(&self, query: &GameQuery) -> Result<Vec<GameScore>, AdapterError>;

    /// Currently in-progress (and recently completed) games, optionally
    /// filtered to the given team codes.
    async fn fetch_live(&self, team_codes: &[String]) -> Result<Vec<GameScore>, AdapterError>;

    /// Scheduled games within `[start, end]`.
    async fn fetch_schedule(
        &self,
        team_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GameScore>, AdapterError>;

    /// Detailed per-game stat lines.
    async fn fetch_box_score(&self, event_id: &str) -> Result<BoxScore, AdapterError>;
}

/// Sport-keyed adapter lookup, so callers never branch on league.
pub struct AdapterRegistry {
    adapters: HashMap<Sport, Arc<dyn SportAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Builds the registry with the production adapter per league, all
    /// sharing one fetcher.
    pub fn production(fetcher: Arc<EthicalFetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NbaAdapter::new(Arc::clone(&fetcher))));
        registry.register(Arc::new(NflAdapter::new(Arc::clone(&fetcher))));
        registry.register(Arc::new(MlbAdapter::new(Arc::clone(&fetcher))));
        registry.register(Arc::new(NhlAdapter::new(fetcher)));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SportAdapter>) {
        self.adapters.insert(adapter.sport(), adapter);
    }

    pub fn get(&self, sport: Sport) -> Option<Arc<dyn SportAdapter>> {
        self.adapters.get(&sport).cloned()
    }

    pub fn sports(&self) -> Vec<Sport> {
        self.adapters.keys().copied().collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
