//! Background job scheduler.
//!
//! Wraps a [`JobScheduler`] with a start/stop lifecycle. Each start builds a
//! fresh scheduler and registers every enabled job; stop shuts it down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use trendcast_core::AppConfig;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::jobs::{JobHandlers, JobKind, JobReport};

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Interval(Duration),
    /// Local wall-clock time, converted to UTC with the configured offset.
    Daily(NaiveTime),
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Interval(every) => write!(f, "every {}m", every.as_secs() / 60),
            Cadence::Daily(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub name: String,
    pub kind: JobKind,
    pub cadence: Cadence,
    pub enabled: bool,
}

impl JobDefinition {
    /// The job registry described by `config`.
    ///
    /// Auto-post jobs exist for every configured time but are only enabled
    /// when auto-posting is switched on.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Vec<JobDefinition> {
        let mut jobs = vec![JobDefinition {
            name: JobKind::CollectSignals.as_str().to_string(),
            kind: JobKind::CollectSignals,
            cadence: Cadence::Interval(Duration::from_secs(config.collect_interval_mins * 60)),
            enabled: true,
        }];
        jobs.extend(config.auto_post_times.iter().map(|at| JobDefinition {
            name: format!("auto_post_{}", at.format("%H:%M")),
            kind: JobKind::AutoPost,
            cadence: Cadence::Daily(*at),
            enabled: config.auto_post_enabled,
        }));
        jobs.push(JobDefinition {
            name: JobKind::RefreshAnalytics.as_str().to_string(),
            kind: JobKind::RefreshAnalytics,
            cadence: Cadence::Interval(Duration::from_secs(config.analytics_interval_mins * 60)),
            enabled: true,
        });
        jobs.push(JobDefinition {
            name: JobKind::DailyPlan.as_str().to_string(),
            kind: JobKind::DailyPlan,
            cadence: Cadence::Daily(config.daily_plan_time),
            enabled: true,
        });
        jobs
    }
}

/// Registry snapshot for one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub kind: JobKind,
    pub cadence: String,
    pub enabled: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<JobReport>,
}

/// UTC cron expression (`sec min hour * * *`) for a local daily time.
#[must_use]
pub fn daily_cron(at: NaiveTime, offset: FixedOffset) -> String {
    let local_minutes = i64::from(at.hour() * 60 + at.minute());
    let offset_minutes = i64::from(offset.local_minus_utc() / 60);
    let utc_minutes = (local_minutes - offset_minutes).rem_euclid(24 * 60);
    format!("0 {} {} * * *", utc_minutes % 60, utc_minutes / 60)
}

struct Running {
    scheduler: JobScheduler,
    job_ids: HashMap<String, Uuid>,
}

type Reports = Arc<Mutex<HashMap<String, JobReport>>>;

pub struct PipelineScheduler {
    handlers: JobHandlers,
    definitions: Vec<JobDefinition>,
    offset: FixedOffset,
    locks: HashMap<String, Arc<Mutex<()>>>,
    reports: Reports,
    state: Mutex<Option<Running>>,
}

impl PipelineScheduler {
    #[must_use]
    pub fn new(handlers: JobHandlers, config: &AppConfig) -> Self {
        Self::with_definitions(
            handlers,
            JobDefinition::from_config(config),
            config.local_offset(),
        )
    }

    #[must_use]
    pub fn with_definitions(
        handlers: JobHandlers,
        definitions: Vec<JobDefinition>,
        offset: FixedOffset,
    ) -> Self {
        let locks = definitions
            .iter()
            .map(|d| (d.name.clone(), Arc::new(Mutex::new(()))))
            .collect();
        Self {
            handlers,
            definitions,
            offset,
            locks,
            reports: Arc::new(Mutex::new(HashMap::new())),
            state: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn definitions(&self) -> &[JobDefinition] {
        &self.definitions
    }

    /// Build a scheduler, register every enabled job, and start it.
    ///
    /// Starting a running scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Scheduler`] if the scheduler cannot be
    /// initialised, a job cannot be registered, or it fails to start.
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            tracing::info!("scheduler: already running");
            return Ok(());
        }

        let scheduler = JobScheduler::new().await?;
        let mut job_ids = HashMap::new();
        for definition in self.definitions.iter().filter(|d| d.enabled) {
            let job = self.build_job(definition)?;
            let id = scheduler.add(job).await?;
            job_ids.insert(definition.name.clone(), id);
        }
        scheduler.start().await?;

        tracing::info!(jobs = job_ids.len(), "scheduler: started");
        *state = Some(Running { scheduler, job_ids });
        Ok(())
    }

    /// Shut the scheduler down. Stopping a stopped scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Scheduler`] if the shutdown fails; the
    /// scheduler is then still reported as running.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        let Some(mut running) = state.take() else {
            return Ok(());
        };
        if let Err(e) = running.scheduler.shutdown().await {
            tracing::error!(error = %e, "scheduler: shutdown failed; still running");
            *state = Some(running);
            return Err(e.into());
        }
        tracing::info!("scheduler: stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Number of jobs registered with the running scheduler.
    pub async fn registered_count(&self) -> usize {
        self.state
            .lock()
            .await
            .as_ref()
            .map_or(0, |running| running.job_ids.len())
    }

    /// Every job with its next run (while running) and last report.
    pub async fn jobs(&self) -> Vec<JobStatus> {
        let mut state = self.state.lock().await;
        let reports = self.reports.lock().await;
        let mut statuses = Vec::with_capacity(self.definitions.len());
        for definition in &self.definitions {
            let next_run = match state.as_mut() {
                Some(running) => match running.job_ids.get(&definition.name) {
                    Some(id) => running
                        .scheduler
                        .next_tick_for_job(*id)
                        .await
                        .ok()
                        .flatten(),
                    None => None,
                },
                None => None,
            };
            statuses.push(JobStatus {
                name: definition.name.clone(),
                kind: definition.kind,
                cadence: definition.cadence.to_string(),
                enabled: definition.enabled,
                next_run,
                last_run: reports.get(&definition.name).cloned(),
            });
        }
        statuses
    }

    /// Run a job now, waiting for any in-flight run of it to finish.
    ///
    /// `name` is a job name (`auto_post_08:00`) or a job kind
    /// (`auto_post`), which picks the first job of that kind.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownJob`] if no job matches `name`.
    pub async fn trigger(&self, name: &str) -> Result<JobReport, PipelineError> {
        let definition = self
            .definitions
            .iter()
            .find(|d| d.name == name)
            .or_else(|| self.definitions.iter().find(|d| d.kind.as_str() == name))
            .ok_or_else(|| PipelineError::UnknownJob(name.to_string()))?;

        let lock = self
            .locks
            .get(&definition.name)
            .cloned()
            .unwrap_or_default();
        let _guard = lock.lock().await;
        let report = self.handlers.run(&definition.name, definition.kind).await;
        self.reports
            .lock()
            .await
            .insert(definition.name.clone(), report.clone());
        Ok(report)
    }

    fn build_job(&self, definition: &JobDefinition) -> Result<Job, JobSchedulerError> {
        let handlers = self.handlers.clone();
        let lock = self
            .locks
            .get(&definition.name)
            .cloned()
            .unwrap_or_default();
        let reports = Arc::clone(&self.reports);
        let name = definition.name.clone();
        let kind = definition.kind;

        let run = move |_uuid, _lock| {
            let handlers = handlers.clone();
            let lock = Arc::clone(&lock);
            let reports = Arc::clone(&reports);
            let name = name.clone();
            Box::pin(async move {
                let Ok(_guard) = lock.try_lock() else {
                    tracing::warn!(job = %name, "scheduler: previous run still in progress; skipping");
                    return;
                };
                let report = handlers.run(&name, kind).await;
                reports.lock().await.insert(name, report);
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        match definition.cadence {
            Cadence::Interval(every) => Job::new_repeated_async(every, run),
            Cadence::Daily(at) => Job::new_async(daily_cron(at, self.offset).as_str(), run),
        }
    }
}

#[cfg(test)]
mod tests {
    use trendcast_core::{build_app_config, Watchlist};
    use trendcast_db::MemoryRepository;

    use super::*;
    use crate::pipeline::Pipeline;

    fn config(overrides: &[(&str, &str)]) -> AppConfig {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("DATABASE_URL".to_string(), "memory://".to_string());
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        build_app_config(|key| vars.get(key).cloned().ok_or(std::env::VarError::NotPresent))
            .unwrap()
    }

    fn scheduler(config: AppConfig) -> PipelineScheduler {
        scheduler_on(Arc::new(MemoryRepository::new()), config)
    }

    fn scheduler_on(repo: Arc<MemoryRepository>, config: AppConfig) -> PipelineScheduler {
        let config = Arc::new(config);
        let pipeline = Pipeline::new(repo, Watchlist::default(), Arc::clone(&config));
        PipelineScheduler::new(JobHandlers::new(Arc::new(pipeline)), &config)
    }

    fn offset(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daily_cron_converts_local_time_to_utc() {
        assert_eq!(daily_cron(at(7, 0), offset(0)), "0 0 7 * * *");
        assert_eq!(daily_cron(at(7, 0), offset(2)), "0 0 5 * * *");
        assert_eq!(daily_cron(at(1, 30), offset(3)), "0 30 22 * * *");
        assert_eq!(daily_cron(at(22, 15), offset(-5)), "0 15 3 * * *");
    }

    #[test]
    fn registry_has_one_auto_post_job_per_time() {
        let jobs = JobDefinition::from_config(&config(&[
            ("TRENDCAST_AUTO_POST_ENABLED", "true"),
            ("TRENDCAST_AUTO_POST_TIMES", "20:00,08:00"),
        ]));

        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "collect_signals",
                "auto_post_08:00",
                "auto_post_20:00",
                "refresh_analytics",
                "daily_plan"
            ]
        );
        assert!(jobs.iter().all(|j| j.enabled));
        assert_eq!(
            jobs[0].cadence,
            Cadence::Interval(Duration::from_secs(30 * 60))
        );
        assert_eq!(jobs[4].cadence, Cadence::Daily(at(7, 0)));
    }

    #[test]
    fn auto_post_jobs_are_disabled_by_default() {
        let jobs = JobDefinition::from_config(&config(&[]));
        let auto_post: Vec<&JobDefinition> =
            jobs.iter().filter(|j| j.kind == JobKind::AutoPost).collect();
        assert_eq!(auto_post.len(), 5);
        assert!(auto_post.iter().all(|j| !j.enabled));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn starting_twice_does_not_register_jobs_twice() {
        let scheduler = scheduler(config(&[]));

        scheduler.start().await.unwrap();
        let registered = scheduler.registered_count().await;
        scheduler.start().await.unwrap();

        assert!(scheduler.is_running().await);
        assert_eq!(registered, 3);
        assert_eq!(scheduler.registered_count().await, registered);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_then_start_registers_every_job_again() {
        let scheduler = scheduler(config(&[("TRENDCAST_AUTO_POST_ENABLED", "true")]));

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.registered_count().await, 8);
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
        assert_eq!(scheduler.registered_count().await, 0);
        scheduler.stop().await.unwrap();

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.registered_count().await, 8);
        let jobs = scheduler.jobs().await;
        let plan = jobs.iter().find(|j| j.name == "daily_plan").unwrap();
        assert!(plan.next_run.is_some());
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn jobs_have_no_next_run_while_stopped() {
        let scheduler = scheduler(config(&[]));
        let jobs = scheduler.jobs().await;
        assert_eq!(jobs.len(), 8);
        assert!(jobs.iter().all(|j| j.next_run.is_none()));
    }

    #[tokio::test]
    async fn trigger_runs_without_a_running_scheduler() {
        let scheduler = scheduler(config(&[]));

        let report = scheduler.trigger("daily_plan").await.unwrap();

        assert!(report.success);
        assert_eq!(report.kind, JobKind::DailyPlan);
        let jobs = scheduler.jobs().await;
        let plan = jobs.iter().find(|j| j.name == "daily_plan").unwrap();
        assert!(plan.last_run.as_ref().is_some_and(|r| r.success));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_job_is_reported_and_other_jobs_keep_running() {
        let repo = Arc::new(MemoryRepository::new());
        let scheduler = scheduler_on(Arc::clone(&repo), config(&[]));
        scheduler.start().await.unwrap();

        repo.set_unavailable(true);
        let failed = scheduler.trigger("daily_plan").await.unwrap();
        assert!(!failed.success);
        assert!(failed.error.is_some());
        assert_eq!(failed.summary, serde_json::Value::Null);
        assert!(scheduler.is_running().await);

        repo.set_unavailable(false);
        let next = scheduler.trigger("refresh_analytics").await.unwrap();
        assert!(next.success);
        assert!(next.error.is_none());

        let jobs = scheduler.jobs().await;
        let plan = jobs.iter().find(|j| j.name == "daily_plan").unwrap();
        assert!(plan.last_run.as_ref().is_some_and(|r| !r.success));
        assert!(plan.next_run.is_some());
        assert!(scheduler.is_running().await);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn trigger_by_kind_picks_the_first_matching_job() {
        let scheduler = scheduler(config(&[]));
        let report = scheduler.trigger("auto_post").await.unwrap();
        assert_eq!(report.job, "auto_post_08:00");
        assert!(report.success);
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let scheduler = scheduler(config(&[]));
        assert!(matches!(
            scheduler.trigger("reindex").await,
            Err(PipelineError::UnknownJob(name)) if name == "reindex"
        ));
    }
}
