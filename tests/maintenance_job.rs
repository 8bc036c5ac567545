//! Single-flight registration of the cleanup cron job.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Duration;

use scorewire::cache::Cache;
use scorewire::dedup::{DedupConfig, Deduplicator};
use scorewire::fetch::{FetchError, HttpTransport, RobotsChecker};
use scorewire::maintenance::{
    schedule_maintenance_job, MaintenanceDeps, MAINTENANCE_CRON, MAINTENANCE_JOB_ID,
};
use scorewire::scheduler::{CronPattern, JobScheduler, Schedule};

struct UnreachableTransport;

#[async_trait]
impl HttpTransport for UnreachableTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::Network {
            url: url.to_string(),
            message: "unreachable".into(),
        })
    }
}

fn deps() -> MaintenanceDeps {
    MaintenanceDeps {
        dedup: Arc::new(Deduplicator::new(DedupConfig::default())),
        cache: Arc::new(Cache::new()),
        robots: Arc::new(RobotsChecker::new(
            Arc::new(UnreachableTransport),
            Duration::from_secs(60),
        )),
        db: None,
    }
}

#[tokio::test]
async fn double_registration_leaves_one_job() {
    let scheduler = JobScheduler::new();

    schedule_maintenance_job(&scheduler, deps()).unwrap();
    schedule_maintenance_job(&scheduler, deps()).unwrap();

    assert_eq!(scheduler.job_ids(), vec![MAINTENANCE_JOB_ID.to_string()]);
    assert_eq!(
        scheduler.schedule_of(MAINTENANCE_JOB_ID),
        Some(Schedule::Cron(CronPattern::parse(MAINTENANCE_CRON).unwrap()))
    );
    scheduler.shutdown();
}
