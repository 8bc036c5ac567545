//! Polite upstream retrieval: robots compliance, per-host rate limiting,
//! bounded timeouts, and retry with backoff.

mod client;
mod fetcher;
mod rate_limit;
mod robots;
mod types;

pub use self::client::{create_http_client, ReqwestTransport};
pub use self::fetcher::EthicalFetcher;
pub use self::rate_limit::RateLimiter;
pub use self::robots::{parse_robots, RobotsChecker, RobotsRules};
pub use self::types::{host_of, FetchError, HttpTransport};
