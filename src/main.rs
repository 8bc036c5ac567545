use anyhow::Result;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use scorewire::adapters::{AdapterRegistry, Sport};
use scorewire::broadcast::BroadcastHub;
use scorewire::cache::Cache;
use scorewire::config::PipelineConfig;
use scorewire::db::Database;
use scorewire::dedup::Deduplicator;
use scorewire::environment::get_env_var_as_vec;
use scorewire::fetch::{EthicalFetcher, HttpTransport, RateLimiter, ReqwestTransport, RobotsChecker};
use scorewire::logging::configure_logging;
use scorewire::maintenance::{schedule_maintenance_job, MaintenanceDeps};
use scorewire::news_agent::NewsAgent;
use scorewire::scheduler::{register_polling_jobs, JobScheduler};
use scorewire::scores_agent::ScoresAgent;

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let config = PipelineConfig::from_env();
    info!("Starting scorewire pipeline");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "scorewire.db".to_string());
    let db = Database::new(&db_path).await?;

    // One shared instance each of the per-host state holders; every adapter
    // goes through the same fetcher.
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let rate_limiter = Arc::new(RateLimiter::new(config.min_request_interval));
    let robots = Arc::new(RobotsChecker::new(
        Arc::clone(&transport),
        config.robots_cache_ttl,
    ));
    let fetcher = Arc::new(EthicalFetcher::new(
        Arc::clone(&robots),
        Arc::clone(&rate_limiter),
        transport,
        &config,
    ));

    let registry = Arc::new(AdapterRegistry::production(fetcher));
    let cache = Arc::new(Cache::new());
    let hub = Arc::new(BroadcastHub::new());
    let dedup = Arc::new(Deduplicator::new(config.dedup.clone()));

    // Articles arrive at the collaborator boundary and flow through this
    // agent, which shares the dedup index and hub with the polling jobs. It
    // also rebuilds the index from rows still inside the check window.
    let news_agent = NewsAgent::new(
        Arc::clone(&dedup),
        Arc::new(db.clone()),
        Arc::clone(&hub),
    );
    let restored = news_agent.restore_index().await?;
    info!("Restored {} dedup records into the rolling index", restored);

    let agent = Arc::new(ScoresAgent::new(
        registry,
        Arc::new(db.clone()),
        Arc::clone(&cache),
        Arc::clone(&hub),
        &config,
    ));

    // SPORTS narrows polling to a comma-separated subset of leagues.
    let sports: Vec<Sport> = {
        let configured = get_env_var_as_vec("SPORTS", ',');
        if configured.is_empty() {
            Sport::all().to_vec()
        } else {
            configured.iter().filter_map(|s| Sport::parse(s)).collect()
        }
    };

    let scheduler = JobScheduler::new();
    register_polling_jobs(&scheduler, agent, &config, &sports);
    schedule_maintenance_job(
        &scheduler,
        MaintenanceDeps {
            dedup,
            cache,
            robots,
            db: Some(db),
        },
    )?;

    info!("Jobs registered: {:?}", scheduler.job_ids());

    signal::ctrl_c().await?;
    info!("Shutting down");
    scheduler.shutdown();

    Ok(())
}
