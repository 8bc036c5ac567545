//! NHL adapter: scraped HTML scoreboard and game summary pages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::debug;

use super::types::{
    AdapterError, BoxScore, GameQuery, GameScore, GameStatus, Sport, StatLine, TeamBoxLine,
};
use super::util::{map_status, namespaced_team_id, parse_period_clock, parse_start_time, team_code};
use super::SportAdapter;
use crate::fetch::EthicalFetcher;
use crate::TARGET_WEB_REQUEST;

const DEFAULT_BASE_URL: &str = "https://scores.nhl.example.com";

/// Scrapes the league scoreboard markup: `div.game` rows with a `data-id`
/// attribute, `.away`/`.home` sides carrying an `abbr.tri` code and a
/// `span.goals` tally, a `span.state` label, and a `time` element with the
/// puck-drop timestamp.
pub struct NhlAdapter {
    fetcher: Arc<EthicalFetcher>,
    base_url: String,
}

impl NhlAdapter {
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

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

fn text_of(element: ElementRef<'_>, css: &str) -> Option<String> {
    element
        .select(&selector(css))
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_scoreboard(body: &str) -> Result<Vec<GameScore>, AdapterError> {
    let document = Html::parse_document(body);
    let game_sel = selector("div.game");

    let mut games = Vec::new();
    for row in document.select(&game_sel) {
        let Some(id) = row.value().attr("data-id") else {
            continue;
        };
        let Some(home_code) = text_of(row, ".home abbr.tri") else {
            continue;
        };
        let Some(away_code) = text_of(row, ".away abbr.tri") else {
            continue;
        };

        let state_text = text_of(row, "span.state").unwrap_or_default();
        let (period, clock) = parse_period_clock(&state_text);
        let status = map_status(&state_text);

        let start_time = row
            .select(&selector("time"))
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(parse_start_time);

        games.push(GameScore {
            id: id.to_string(),
            league: Sport::Nhl,
            home_team_id: namespaced_team_id(Sport::Nhl, &home_code),
            away_team_id: namespaced_team_id(Sport::Nhl, &away_code),
            home_pts: text_of(row, ".home span.goals")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            away_pts: text_of(row, ".away span.goals")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            status,
            period: if status == GameStatus::InProgress {
                period
            } else {
                None
            },
            time_remaining: if status == GameStatus::InProgress {
                clock
            } else {
                None
            },
            start_time,
            source: "nhl-scoreboard".to_string(),
            cached_at: Utc::now(),
        });
    }

    if games.is_empty() && !body.contains("class=\"game\"") {
        return Err(AdapterError::parse(
            Sport::Nhl,
            "scoreboard markup missing game rows",
        ));
    }
    Ok(games)
}

fn parse_box_score(body: &str, event_id: &str) -> Result<BoxScore, AdapterError> {
    let document = Html::parse_document(body);

    let team_line = |css: &str| -> Result<TeamBoxLine, AdapterError> {
        let block = document.select(&selector(css)).next().ok_or_else(|| {
            AdapterError::parse(Sport::Nhl, format!("game summary missing {}", css))
        })?;
        let code = text_of(block, "abbr.tri").ok_or_else(|| {
            AdapterError::parse(Sport::Nhl, "game summary side missing team code")
        })?;
        let points = text_of(block, "span.goals")
            .and_then(|g| g.parse().ok())
            .unwrap_or(0);

        let players = block
            .select(&selector("li.skater"))
            .filter_map(|li| {
                let name = text_of(li, ".name")?;
                Some(StatLine {
                    player: name,
                    points: text_of(li, ".points").and_then(|p| p.parse().ok()).unwrap_or(0),
                    detail: text_of(li, ".toi").map(|t| format!("TOI {}", t)),
                })
            })
            .collect();

        Ok(TeamBoxLine {
            team_id: namespaced_team_id(Sport::Nhl, &code),
            points,
            players,
        })
    };

    Ok(BoxScore {
        event_id: event_id.to_string(),
        league: Sport::Nhl,
        home: team_line("section.summary .home")?,
        away: team_line("section.summary .away")?,
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
impl SportAdapter for NhlAdapter {
    fn sport(&self) -> Sport {
        Sport::Nhl
    }

    async fn fetch_recent_games(&self, query: &GameQuery) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scoreboard", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        let mut games: Vec<GameScore> = parse_scoreboard(&body)?
            .into_iter()
            .filter(|g| matches_team_filter(g, &query.team_ids))
            .collect();
        games.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if query.limit > 0 {
            games.truncate(query.limit);
        }
        debug!(target: TARGET_WEB_REQUEST, "NHL recent games: {}", games.len());
        Ok(games)
    }

    async fn fetch_live(&self, team_codes: &[String]) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scoreboard", self.base_url);
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
        let url = format!(
            "{}/schedule?start={}&end={}",
            self.base_url,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        let body = self.fetcher.fetch(&url).await?;

        Ok(parse_scoreboard(&body)?
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
        let url = format!("{}/game/{}/summary", self.base_url, event_id);
        let body = self.fetcher.fetch(&url).await?;
        parse_box_score(&body, event_id)
    }
}
