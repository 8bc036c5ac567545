//! Per-host robots rule fetching, parsing, and caching.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::types::HttpTransport;
use crate::TARGET_WEB_REQUEST;

/// The user-agent token matched against robots groups.
const AGENT_TOKEN: &str = "scorewirebot";

/// One allow/disallow line from a robots group.
#[derive(Debug, Clone)]
struct RobotsRule {
    allow: bool,
    prefix: String,
}

/// Parsed rules applying to our agent on one host.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<RobotsRule>,
}

impl RobotsRules {
    /// Permissive rule set used when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Longest-prefix match; an Allow rule wins over a Disallow of equal
    /// length. No matching rule means allowed.
    fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<&RobotsRule> = None;
        for rule in &self.rules {
            if rule.prefix.is_empty() || !path.starts_with(&rule.prefix) {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => {
                    rule.prefix.len() > current.prefix.len()
                        || (rule.prefix.len() == current.prefix.len() && rule.allow)
                }
            };
            if better {
                best = Some(rule);
            }
        }
        best.map(|r| r.allow).unwrap_or(true)
    }
}

/// Parses robots.txt content into the rules applying to our agent.
///
/// Groups naming the agent token take precedence over wildcard groups.
/// Malformed lines are skipped.
pub fn parse_robots(content: &str) -> RobotsRules {
    let mut wildcard = Vec::new();
    let mut specific = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut in_group_body = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                if in_group_body {
                    current_agents.clear();
                    in_group_body = false;
                }
                current_agents.push(value.to_ascii_lowercase());
            }
            "allow" | "disallow" => {
                in_group_body = true;
                // An empty Disallow permits everything; represent it as no rule.
                if value.is_empty() {
                    continue;
                }
                let rule = RobotsRule {
                    allow: field == "allow",
                    prefix: value.trim_end_matches('*').to_string(),
                };
                for agent in &current_agents {
                    if agent == "*" {
                        wildcard.push(rule.clone());
                    } else if AGENT_TOKEN.contains(agent.as_str()) || agent.contains(AGENT_TOKEN) {
                        specific.push(rule.clone());
                    }
                }
            }
            _ => {
                // crawl-delay, sitemap, and unknown fields are ignored
                in_group_body = true;
            }
        }
    }

    RobotsRules {
        rules: if specific.is_empty() {
            wildcard
        } else {
            specific
        },
    }
}

struct RobotsCacheEntry {
    rules: RobotsRules,
    fetched_at: Instant,
}

/// Fetches, parses, and caches per-host robots rules.
///
/// Stale entries are refetched on next use, not trusted indefinitely. On a
/// fetch failure the policy is permissive so a flaky robots endpoint does not
/// starve every adapter; the failure is logged.
pub struct RobotsChecker {
    transport: Arc<dyn HttpTransport>,
    ttl: Duration,
    cache: DashMap<String, RobotsCacheEntry>,
}

impl RobotsChecker {
    pub fn new(transport: Arc<dyn HttpTransport>, ttl: Duration) -> Self {
        Self {
            transport,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Whether our agent may fetch `url` according to the host's robots rules.
    pub async fn can_fetch(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            // Not for robots to police; the fetcher rejects it properly.
            return true;
        };
        let Some(host) = parsed.host_str().map(|h| h.to_string()) else {
            return true;
        };

        let fresh = self
            .cache
            .get(&host)
            .map(|entry| entry.fetched_at.elapsed() < self.ttl)
            .unwrap_or(false);

        if !fresh {
            let rules = self.fetch_rules(parsed.scheme(), &host).await;
            self.cache.insert(
                host.clone(),
                RobotsCacheEntry {
                    rules,
                    fetched_at: Instant::now(),
                },
            );
        }

        let path = parsed.path();
        self.cache
            .get(&host)
            .map(|entry| entry.rules.is_allowed(path))
            .unwrap_or(true)
    }

    /// Administrative reset.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drops entries past their TTL; they would be refetched on next use
    /// anyway, this just bounds memory between uses.
    pub fn purge_expired(&self) {
        self.cache
            .retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
    }

    async fn fetch_rules(&self, scheme: &str, host: &str) -> RobotsRules {
        let robots_url = format!("{}://{}/robots.txt", scheme, host);
        debug!(target: TARGET_WEB_REQUEST, "Fetching robots rules from {}", robots_url);

        match self.transport.get(&robots_url).await {
            Ok(body) => parse_robots(&body),
            Err(err) => {
                warn!(
                    target: TARGET_WEB_REQUEST,
                    "Failed to fetch {}: {}; defaulting to permissive", robots_url, err
                );
                RobotsRules::allow_all()
            }
        }
    }
}
