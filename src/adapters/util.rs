//! Normalization helpers shared by the league adapters.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

use super::types::{GameStatus, Sport};
use crate::TARGET_WEB_REQUEST;

/// Builds the league-prefixed team identifier, e.g. `NBA_LAL`.
pub fn namespaced_team_id(sport: Sport, code: &str) -> String {
    format!("{}_{}", sport.as_str(), code.trim().to_ascii_uppercase())
}

/// Strips the league prefix back off a namespaced team id, if present.
pub fn team_code(team_id: &str) -> &str {
    team_id
        .split_once('_')
        .map(|(_, code)| code)
        .unwrap_or(team_id)
}

/// Maps the status vocabulary of any tracked upstream onto the three-value
/// status enum. Unknown strings normalize to `Scheduled`.
pub fn map_status(raw: &str) -> GameStatus {
    let lowered = raw.trim().to_ascii_lowercase();

    if lowered.is_empty() {
        return GameStatus::Scheduled;
    }

    const FINAL_WORDS: [&str; 6] = [
        "final", "completed", "complete", "closed", "ended", "full-time",
    ];
    if FINAL_WORDS.iter().any(|w| lowered.starts_with(w))
        || lowered == "f"
        || lowered == "ft"
        || lowered.starts_with("f/")
    {
        return GameStatus::Final;
    }

    const LIVE_WORDS: [&str; 7] = [
        "in progress",
        "in_progress",
        "live",
        "halftime",
        "half",
        "end of",
        "delayed",
    ];
    if LIVE_WORDS.iter().any(|w| lowered.starts_with(w))
        || lowered == "ot"
        || lowered == "so"
        || lowered.starts_with("ot ")
    {
        return GameStatus::InProgress;
    }

    // Period markers like "Q4 2:31", "Top 7th", "3rd 12:40"
    static RE_PERIOD: OnceCell<Regex> = OnceCell::new();
    let re = RE_PERIOD.get_or_init(|| {
        Regex::new(r"(?i)^(q\d|\d(st|nd|rd|th)|top|bot|bottom|mid|period)").unwrap()
    });
    if re.is_match(&lowered) {
        return GameStatus::InProgress;
    }

    const SCHEDULED_WORDS: [&str; 5] = ["scheduled", "pre", "pregame", "upcoming", "tbd"];
    let looks_like_tipoff_time = lowered.contains("am") || lowered.contains("pm");
    if !SCHEDULED_WORDS.iter().any(|w| lowered.starts_with(w)) && !looks_like_tipoff_time {
        debug!(target: TARGET_WEB_REQUEST, "Unrecognized status string {:?}; treating as scheduled", raw);
    }
    GameStatus::Scheduled
}

/// Splits an upstream clock string like "Q4 2:31" into a period number and
/// the remaining clock.
pub fn parse_period_clock(raw: &str) -> (Option<u8>, Option<String>) {
    static RE_CLOCK: OnceCell<Regex> = OnceCell::new();
    let re = RE_CLOCK
        .get_or_init(|| Regex::new(r"(?i)(?:q|period\s*)?(\d{1,2})\D*?(\d{1,2}:\d{2})?\s*$").unwrap());

    match re.captures(raw.trim()) {
        Some(caps) => {
            let period = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let clock = caps.get(2).map(|m| m.as_str().to_string());
            (period, clock)
        }
        None => (None, None),
    }
}

/// Parses the timestamp formats seen across upstream feeds.
pub fn parse_start_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_ids_are_namespaced_by_league() {
        assert_eq!(namespaced_team_id(Sport::Nba, "lal"), "NBA_LAL");
        assert_eq!(namespaced_team_id(Sport::Nhl, " BOS "), "NHL_BOS");
        assert_eq!(team_code("NBA_LAL"), "LAL");
        assert_eq!(team_code("LAL"), "LAL");
    }

    #[test]
    fn status_vocabularies_converge() {
        assert_eq!(map_status("Final"), GameStatus::Final);
        assert_eq!(map_status("F/OT"), GameStatus::Final);
        assert_eq!(map_status("Completed"), GameStatus::Final);
        assert_eq!(map_status("LIVE"), GameStatus::InProgress);
        assert_eq!(map_status("Q4 2:31"), GameStatus::InProgress);
        assert_eq!(map_status("Top 7th"), GameStatus::InProgress);
        assert_eq!(map_status("Halftime"), GameStatus::InProgress);
        assert_eq!(map_status("Scheduled"), GameStatus::Scheduled);
        assert_eq!(map_status("7:30 pm ET"), GameStatus::Scheduled);
        assert_eq!(map_status(""), GameStatus::Scheduled);
        assert_eq!(map_status("???"), GameStatus::Scheduled);
    }

    #[test]
    fn clock_strings_split() {
        assert_eq!(parse_period_clock("Q4 2:31"), (Some(4), Some("2:31".into())));
        assert_eq!(parse_period_clock("Period 2 10:05"), (Some(2), Some("10:05".into())));
        assert_eq!(parse_period_clock(""), (None, None));
    }

    #[test]
    fn start_times_parse() {
        assert!(parse_start_time("2026-03-01T19:30:00Z").is_some());
        assert!(parse_start_time("2026-03-01 19:30:00").is_some());
        assert!(parse_start_time("tonight").is_none());
    }
}
