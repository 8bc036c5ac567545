//! Recurring job execution with single-flight registration per job id.

use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::adapters::Sport;
use crate::config::PipelineConfig;
use crate::scores_agent::{CycleMode, CycleRequest, ScoresAgent};
use crate::TARGET_SCHEDULER;

/// How many games a featured polling cycle asks for.
const FEATURED_LIMIT: usize = 10;

/// Search horizon for the next cron fire time. A pattern with no match
/// within this many minutes never fires.
const CRON_SEARCH_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronParseError {
    #[error("cron pattern must have 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid cron field {field:?}: {message}")]
    Field { field: String, message: String },
}

/// One of the five cron fields, expanded to its matching values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CronField {
    values: Vec<u32>,
    restricted: bool,
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        !self.restricted || self.values.binary_search(&value).is_ok()
    }
}

fn parse_field(spec: &str, min: u32, max: u32) -> Result<CronField, CronParseError> {
    let err = |message: &str| CronParseError::Field {
        field: spec.to_string(),
        message: message.to_string(),
    };

    let mut values = Vec::new();
    let mut restricted = false;

    for part in spec.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| err("bad step"))?;
                if step == 0 {
                    return Err(err("step must be positive"));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            if step == 1 && spec == "*" {
                // Bare wildcard: matches everything without enumeration.
                return Ok(CronField {
                    values: Vec::new(),
                    restricted: false,
                });
            }
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| err("bad range start"))?;
            let hi: u32 = hi.parse().map_err(|_| err("bad range end"))?;
            if lo > hi {
                return Err(err("range start exceeds end"));
            }
            (lo, hi)
        } else {
            let value: u32 = range.parse().map_err(|_| err("bad value"))?;
            (value, value)
        };

        if lo < min || hi > max {
            return Err(err("value out of bounds"));
        }
        restricted = true;
        values.extend((lo..=hi).step_by(step as usize));
    }

    values.sort_unstable();
    values.dedup();
    if restricted && values.is_empty() {
        return Err(err("field matches nothing"));
    }
    Ok(CronField { values, restricted })
}

/// A parsed 5-field cron pattern (`minute hour day-of-month month
/// day-of-week`), evaluated in UTC. Supports `*`, lists, ranges, and
/// `*/step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronPattern {
    source: String,
    minute: CronField,
    hour: CronField,
    dom: CronField,
    month: CronField,
    dow: CronField,
}

impl CronPattern {
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }

        // Accept 7 as Sunday alongside 0, as cron implementations do.
        let mut dow = parse_field(fields[4], 0, 7)?;
        if dow.restricted {
            for value in dow.values.iter_mut() {
                if *value == 7 {
                    *value = 0;
                }
            }
            dow.values.sort_unstable();
            dow.values.dedup();
        }

        Ok(Self {
            source: expr.to_string(),
            minute: parse_field(fields[0], 0, 59)?,
            hour: parse_field(fields[1], 0, 23)?,
            dom: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            dow,
        })
    }

    /// The original pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn matches(&self, t: DateTime<Utc>) -> bool {
        if !self.minute.matches(t.minute())
            || !self.hour.matches(t.hour())
            || !self.month.matches(t.month())
        {
            return false;
        }

        let dom_ok = self.dom.matches(t.day());
        let dow_ok = self.dow.matches(t.weekday().num_days_from_sunday());
        // When both day fields are restricted, either matching suffices.
        if self.dom.restricted && self.dow.restricted {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    }

    /// The first matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = (after + chrono::Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;
        for _ in 0..CRON_SEARCH_MINUTES {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += chrono::Duration::minutes(1);
        }
        None
    }
}

/// When a job runs: a fixed interval or a cron pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Every(Duration),
    Cron(CronPattern),
}

impl Schedule {
    /// How long to sleep from `now` until the next tick.
    fn delay_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Schedule::Every(interval) => Some(*interval),
            Schedule::Cron(pattern) => pattern
                .next_after(now)
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

type JobHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A recurring job: stable identity, schedule, and handler.
pub struct Job {
    pub id: String,
    pub schedule: Schedule,
    handler: JobHandler,
}

impl Job {
    pub fn new<F, Fut>(id: impl Into<String>, schedule: Schedule, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            schedule,
            handler: Arc::new(move || handler().boxed()),
        }
    }
}

struct RegisteredJob {
    schedule: Schedule,
    handle: JoinHandle<()>,
}

/// Runs registered jobs on their schedules.
///
/// Registration is an upsert keyed by job id: re-registering an id replaces
/// the previous schedule instead of duplicating it. Every tick runs the
/// handler as its own task, so a slow run can overlap the next tick and a
/// failing or panicking handler never kills the job loop; a failed run
/// simply waits for the next scheduled tick.
#[derive(Default)]
pub struct JobScheduler {
    jobs: DashMap<String, RegisteredJob>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job: Job) {
        let Job {
            id,
            schedule,
            handler,
        } = job;

        let loop_id = id.clone();
        let loop_schedule = schedule.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Some(delay) = loop_schedule.delay_from(Utc::now()) else {
                    warn!(
                        target: TARGET_SCHEDULER,
                        "Job {} has no future fire time; stopping its loop", loop_id
                    );
                    break;
                };
                sleep(delay).await;

                debug!(target: TARGET_SCHEDULER, "Job {} tick", loop_id);
                let run = tokio::spawn((handler)());
                let watched_id = loop_id.clone();
                tokio::spawn(async move {
                    match run.await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => warn!(
                            target: TARGET_SCHEDULER,
                            "Job {} failed: {}; waiting for its next scheduled run", watched_id, err
                        ),
                        Err(join_err) => error!(
                            target: TARGET_SCHEDULER,
                            "Job {} panicked: {}", watched_id, join_err
                        ),
                    }
                });
            }
        });

        if let Some(previous) = self.jobs.insert(id.clone(), RegisteredJob { schedule, handle }) {
            info!(target: TARGET_SCHEDULER, "Job {} re-registered; replacing its schedule", id);
            previous.handle.abort();
        } else {
            info!(target: TARGET_SCHEDULER, "Job {} registered", id);
        }
    }

    /// Removes a job and stops its loop. Returns whether it existed.
    pub fn deschedule(&self, id: &str) -> bool {
        match self.jobs.remove(id) {
            Some((_, job)) => {
                job.handle.abort();
                info!(target: TARGET_SCHEDULER, "Job {} descheduled", id);
                true
            }
            None => false,
        }
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn schedule_of(&self, id: &str) -> Option<Schedule> {
        self.jobs.get(id).map(|job| job.schedule.clone())
    }

    /// Stops every job loop. In-flight handler runs are not interrupted.
    pub fn shutdown(&self) {
        for entry in self.jobs.iter() {
            entry.value().handle.abort();
        }
        self.jobs.clear();
    }
}

/// Registers the per-sport polling jobs: a short-interval live poll and a
/// longer-interval featured poll, both driving the scores agent.
pub fn register_polling_jobs(
    scheduler: &JobScheduler,
    agent: Arc<ScoresAgent>,
    config: &PipelineConfig,
    sports: &[Sport],
) {
    for &sport in sports {
        let live_agent = Arc::clone(&agent);
        scheduler.register(Job::new(
            format!("poll:live:{}", sport),
            Schedule::Every(config.live_poll_interval),
            move || {
                let agent = Arc::clone(&live_agent);
                async move {
                    agent
                        .run_once(&CycleRequest {
                            sport,
                            mode: CycleMode::Live,
                            limit: 0,
                        })
                        .await?;
                    Ok(())
                }
            },
        ));

        let featured_agent = Arc::clone(&agent);
        scheduler.register(Job::new(
            format!("poll:featured:{}", sport),
            Schedule::Every(config.idle_poll_interval),
            move || {
                let agent = Arc::clone(&featured_agent);
                async move {
                    agent
                        .run_once(&CycleRequest {
                            sport,
                            mode: CycleMode::Featured,
                            limit: FEATURED_LIMIT,
                        })
                        .await?;
                    Ok(())
                }
            },
        ));
    }
}
