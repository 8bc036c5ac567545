pub mod access;
pub mod adapters;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod db;
pub mod dedup;
pub mod environment;
pub mod fetch;
pub mod logging;
pub mod maintenance;
pub mod news_agent;
pub mod scheduler;
pub mod scores_agent;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_DEDUP: &str = "dedup";
pub const TARGET_SCHEDULER: &str = "scheduler";
pub const TARGET_BROADCAST: &str = "broadcast";
