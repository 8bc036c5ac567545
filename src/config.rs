use tokio::time::Duration;

use crate::dedup::DedupConfig;
use crate::environment::get_env_var_or;

/// Runtime configuration for the ingestion pipeline, read once at startup.
///
/// Every knob has a production default so the binary runs with an empty
/// environment; tests construct the struct directly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum spacing between requests to a single host.
    pub min_request_interval: Duration,
    /// How long parsed robots rules are trusted before a refetch.
    pub robots_cache_ttl: Duration,
    /// Per-request network timeout.
    pub request_timeout: Duration,
    /// Retry bound for a single fetch (not counting the first attempt).
    pub max_retries: usize,
    /// Base delay for exponential backoff between retries.
    pub retry_delay: Duration,
    /// Poll interval while a sport has games in progress.
    pub live_poll_interval: Duration,
    /// Poll interval while nothing is live.
    pub idle_poll_interval: Duration,
    /// TTL for cached score lists.
    pub cache_ttl: Duration,
    pub dedup: DedupConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            min_request_interval: Duration::from_millis(get_env_var_or(
                "MIN_REQUEST_INTERVAL_MS",
                1_000,
            )),
            robots_cache_ttl: Duration::from_secs(get_env_var_or("ROBOTS_CACHE_TTL_SECS", 3_600)),
            request_timeout: Duration::from_secs(get_env_var_or("REQUEST_TIMEOUT_SECS", 10)),
            max_retries: get_env_var_or("FETCH_MAX_RETRIES", 3),
            retry_delay: Duration::from_millis(get_env_var_or("FETCH_RETRY_DELAY_MS", 500)),
            live_poll_interval: Duration::from_secs(get_env_var_or("LIVE_POLL_SECS", 30)),
            idle_poll_interval: Duration::from_secs(get_env_var_or("IDLE_POLL_SECS", 300)),
            cache_ttl: Duration::from_secs(get_env_var_or("SCORES_CACHE_TTL_SECS", 300)),
            dedup: DedupConfig {
                similarity_threshold: get_env_var_or("DEDUP_SIMILARITY_THRESHOLD", 0.85),
                check_window_days: get_env_var_or("DEDUP_CHECK_WINDOW_DAYS", 7),
                shingle_size: get_env_var_or("DEDUP_SHINGLE_SIZE", 3),
                num_hashes: get_env_var_or("DEDUP_NUM_HASHES", 128),
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_request_interval: Duration::from_millis(1_000),
            robots_cache_ttl: Duration::from_secs(3_600),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            live_poll_interval: Duration::from_secs(30),
            idle_poll_interval: Duration::from_secs(300),
            cache_ttl: Duration::from_secs(300),
            dedup: DedupConfig::default(),
        }
    }
}
