//! Daily cleanup: expired dedup records, cache entries, and robots rules.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::db::Database;
use crate::dedup::Deduplicator;
use crate::fetch::RobotsChecker;
use crate::scheduler::{CronPattern, Job, JobScheduler, Schedule};
use crate::TARGET_SCHEDULER;

pub const MAINTENANCE_JOB_ID: &str = "maintenance:cleanup";
/// Daily at 03:00 UTC.
pub const MAINTENANCE_CRON: &str = "0 3 * * *";

/// Everything the cleanup pass touches. `db` is optional so the pass also
/// runs in wiring without SQLite behind it.
#[derive(Clone)]
pub struct MaintenanceDeps {
    pub dedup: Arc<Deduplicator>,
    pub cache: Arc<Cache>,
    pub robots: Arc<RobotsChecker>,
    pub db: Option<Database>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceSummary {
    pub dedup_purged: usize,
    pub cache_purged: usize,
    pub dedup_rows_purged: u64,
}

/// Runs one cleanup pass. Individual failures are logged, never fatal.
pub async fn run_maintenance(deps: &MaintenanceDeps) -> MaintenanceSummary {
    let mut summary = MaintenanceSummary {
        dedup_purged: deps.dedup.purge_expired(),
        cache_purged: deps.cache.purge_expired(),
        ..MaintenanceSummary::default()
    };
    deps.robots.purge_expired();

    if let Some(db) = &deps.db {
        let cutoff = Utc::now() - Duration::days(deps.dedup.config().check_window_days);
        match db.purge_dedup_records(cutoff).await {
            Ok(purged) => summary.dedup_rows_purged = purged,
            Err(err) => {
                warn!(target: TARGET_SCHEDULER, "Dedup row purge failed: {}", err);
            }
        }
    }

    info!(
        target: TARGET_SCHEDULER,
        "Maintenance pass: {} dedup records, {} cache entries, {} dedup rows purged",
        summary.dedup_purged,
        summary.cache_purged,
        summary.dedup_rows_purged
    );
    summary
}

/// Registers the cleanup cron job. Registration is keyed by
/// [`MAINTENANCE_JOB_ID`], so calling this again replaces rather than
/// duplicates the schedule.
pub fn schedule_maintenance_job(scheduler: &JobScheduler, deps: MaintenanceDeps) -> Result<()> {
    let pattern = CronPattern::parse(MAINTENANCE_CRON)?;
    scheduler.register(Job::new(
        MAINTENANCE_JOB_ID,
        Schedule::Cron(pattern),
        move || {
            let deps = deps.clone();
            async move {
                run_maintenance(&deps).await;
                Ok(())
            }
        },
    ));
    Ok(())
}
