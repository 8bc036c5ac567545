//! NFL adapter: scraped HTML scoreboard and box score pages.

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

const DEFAULT_BASE_URL: &str = "https://scores.nfl.example.com";

/// Scrapes the league scoreboard markup: one `article.game-strip` per game
/// carrying `data-game-id`, a `.team.home`/`.team.away` pair with
/// `.team-code` and `.team-score` spans, a `.game-status` label, and a
/// `time.kickoff` element with a `datetime` attribute.
pub struct NflAdapter {
    fetcher: Arc<EthicalFetcher>,
    base_url: String,
}

impl NflAdapter {
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
    // The selectors are compile-time constants; a typo is a programming error
    // caught by the fixture tests.
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
    let game_sel = selector("article.game-strip");

    let mut games = Vec::new();
    for strip in document.select(&game_sel) {
        let Some(id) = strip.value().attr("data-game-id") else {
            continue;
        };
        let Some(home_code) = text_of(strip, ".team.home .team-code") else {
            continue;
        };
        let Some(away_code) = text_of(strip, ".team.away .team-code") else {
            continue;
        };

        let status_text = text_of(strip, ".game-status").unwrap_or_default();
        let (period, clock) = parse_period_clock(&status_text);
        let status = map_status(&status_text);

        let start_time = strip
            .select(&selector("time.kickoff"))
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(parse_start_time);

        games.push(GameScore {
            id: id.to_string(),
            league: Sport::Nfl,
            home_team_id: namespaced_team_id(Sport::Nfl, &home_code),
            away_team_id: namespaced_team_id(Sport::Nfl, &away_code),
            home_pts: text_of(strip, ".team.home .team-score")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            away_pts: text_of(strip, ".team.away .team-score")
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
            source: "nfl-scoreboard".to_string(),
            cached_at: Utc::now(),
        });
    }

    if games.is_empty() && !body.contains("game-strip") {
        return Err(AdapterError::parse(
            Sport::Nfl,
            "scoreboard markup missing game strips",
        ));
    }
    Ok(games)
}

fn parse_box_score(body: &str, event_id: &str) -> Result<BoxScore, AdapterError> {
    let document = Html::parse_document(body);

    let team_line = |css: &str| -> Result<TeamBoxLine, AdapterError> {
        let table = document.select(&selector(css)).next().ok_or_else(|| {
            AdapterError::parse(Sport::Nfl, format!("box score missing {}", css))
        })?;
        let code = table.value().attr("data-team-code").ok_or_else(|| {
            AdapterError::parse(Sport::Nfl, "box score team missing data-team-code")
        })?;
        let points = table
            .value()
            .attr("data-points")
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);

        let players = table
            .select(&selector("tr.player-row"))
            .filter_map(|row| {
                let name = text_of(row, ".player-name")?;
                Some(StatLine {
                    player: name,
                    points: text_of(row, ".player-points")
                        .and_then(|p| p.parse().ok())
                        .unwrap_or(0),
                    detail: text_of(row, ".player-detail"),
                })
            })
            .collect();

        Ok(TeamBoxLine {
            team_id: namespaced_team_id(Sport::Nfl, code),
            points,
            players,
        })
    };

    Ok(BoxScore {
        event_id: event_id.to_string(),
        league: Sport::Nfl,
        home: team_line("table.team.home")?,
        away: team_line("table.team.away")?,
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
impl SportAdapter for NflAdapter {
    fn sport(&self) -> Sport {
        Sport::Nfl
    }

    async fn fetch_recent_games(&self, query: &GameQuery) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scores", self.base_url);
        let body = self.fetcher.fetch(&url).await?;

        let mut games: Vec<GameScore> = parse_scoreboard(&body)?
            .into_iter()
            .filter(|g| matches_team_filter(g, &query.team_ids))
            .collect();
        games.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if query.limit > 0 {
            games.truncate(query.limit);
        }
        debug!(target: TARGET_WEB_REQUEST, "NFL recent games: {}", games.len());
        Ok(games)
    }

    async fn fetch_live(&self, team_codes: &[String]) -> Result<Vec<GameScore>, AdapterError> {
        let url = format!("{}/scores", self.base_url);
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
        let url = format!("{}/schedule", self.base_url);
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
        let url = format!("{}/boxscore/{}", self.base_url, event_id);
        let body = self.fetcher.fetch(&url).await?;
        parse_box_score(&body, event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOREBOARD_FIXTURE: &str = r#"
        <html><body>
        <article class="game-strip" data-game-id="2026-W12-KC-BUF">
            <div class="team away"><span class="team-code">KC</span><span class="team-score">17</span></div>
            <div class="team home"><span class="team-code">BUF</span><span class="team-score">20</span></div>
            <div class="game-status">Q4 2:31</div>
            <time class="kickoff" datetime="2026-11-22T18:00:00Z"></time>
        </article>
        <article class="game-strip" data-game-id="2026-W12-DAL-PHI">
            <div class="team away"><span class="team-code">DAL</span></div>
            <div class="team home"><span class="team-code">PHI</span></div>
            <div class="game-status">Sunday 4:25 pm ET</div>
            <time class="kickoff" datetime="2026-11-22T21:25:00Z"></time>
        </article>
        </body></html>
    "#;

    #[test]
    fn scoreboard_markup_normalizes() {
        let games = parse_scoreboard(SCOREBOARD_FIXTURE).unwrap();
        assert_eq!(games.len(), 2);

        let live = &games[0];
        assert_eq!(live.id, "2026-W12-KC-BUF");
        assert_eq!(live.home_team_id, "NFL_BUF");
        assert_eq!(live.away_team_id, "NFL_KC");
        assert_eq!(live.home_pts, 20);
        assert_eq!(live.away_pts, 17);
        assert_eq!(live.status, GameStatus::InProgress);
        assert_eq!(live.period, Some(4));
        assert_eq!(live.time_remaining.as_deref(), Some("2:31"));

        let upcoming = &games[1];
        assert_eq!(upcoming.status, GameStatus::Scheduled);
        assert_eq!(upcoming.period, None);
        assert!(upcoming.start_time.is_some());
    }

    #[test]
    fn page_without_strips_is_a_parse_error() {
        assert!(matches!(
            parse_scoreboard("<html><body>Access denied</body></html>"),
            Err(AdapterError::Parse { .. })
        ));
    }

    const BOXSCORE_FIXTURE: &str = r#"
        <section class="boxscore">
        <table class="team away" data-team-code="KC" data-points="17">
            <tr class="player-row"><td class="player-name">P. Mahomes</td><td class="player-points">12</td><td class="player-detail">2 TD</td></tr>
        </table>
        <table class="team home" data-team-code="BUF" data-points="20">
            <tr class="player-row"><td class="player-name">J. Allen</td><td class="player-points">14</td></tr>
        </table>
        </section>
    "#;

    #[test]
    fn box_score_markup_normalizes() {
        let box_score = parse_box_score(BOXSCORE_FIXTURE, "2026-W12-KC-BUF").unwrap();
        assert_eq!(box_score.home.team_id, "NFL_BUF");
        assert_eq!(box_score.home.points, 20);
        assert_eq!(box_score.away.players.len(), 1);
        assert_eq!(box_score.away.players[0].player, "P. Mahomes");
        assert_eq!(box_score.away.players[0].detail.as_deref(), Some("2 TD"));
    }
}
