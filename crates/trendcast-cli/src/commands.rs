//! Command handlers for the CLI.
//!
//! Each handler runs one pipeline operation and prints the result as JSON.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use trendcast_core::{AppConfig, Platform};
use trendcast_pipeline::{JobHandlers, Pipeline, PipelineScheduler};

pub(crate) struct Context {
    pipeline: Arc<Pipeline>,
    scheduler: PipelineScheduler,
}

impl Context {
    /// Open the store and wire the pipeline the way the server does.
    pub(crate) async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let watchlist = trendcast_core::load_watchlist(&config.watchlist_path)?;
        let repo = trendcast_db::open_repository(&config).await?;
        let pipeline = Arc::new(Pipeline::from_config(repo, watchlist, Arc::clone(&config))?);
        let scheduler = PipelineScheduler::new(JobHandlers::new(Arc::clone(&pipeline)), &config);
        tracing::debug!(memory_store = config.uses_memory_store(), "cli context ready");
        Ok(Self {
            pipeline,
            scheduler,
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run_detect(ctx: &Context) -> anyhow::Result<()> {
    let report = ctx.pipeline.trigger_detection().await?;
    print_json(&report)
}

pub(crate) async fn run_trends(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.pipeline.list_trends().await?)
}

pub(crate) fn run_predict(
    ctx: &Context,
    title: &str,
    description: &str,
    source: &str,
    category: &str,
) {
    let prediction = ctx
        .pipeline
        .predict_viral(title, description, source, category);
    println!(
        "score {:.1}: {}",
        prediction.score, prediction.recommendation
    );
    for factor in &prediction.factors {
        println!("  + {factor}");
    }
}

pub(crate) async fn run_generate(ctx: &Context, trend_id: i64, count: usize) -> anyhow::Result<()> {
    let created = ctx.pipeline.generate_candidates(trend_id, count).await?;
    print_json(&created)
}

pub(crate) async fn run_approve(ctx: &Context, id: i64) -> anyhow::Result<()> {
    print_json(&ctx.pipeline.approve(id).await?)
}

pub(crate) async fn run_reject(ctx: &Context, id: i64) -> anyhow::Result<()> {
    print_json(&ctx.pipeline.reject(id).await?)
}

pub(crate) async fn run_schedule(
    ctx: &Context,
    id: i64,
    platform: Platform,
    at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    print_json(&ctx.pipeline.schedule(id, platform, at).await?)
}

pub(crate) async fn run_schedule_post(
    ctx: &Context,
    id: i64,
    at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    print_json(&ctx.pipeline.schedule_post(id, at).await?)
}

/// Publish now; exits non-zero if any platform failed.
pub(crate) async fn run_publish(
    ctx: &Context,
    id: i64,
    platforms: &[Platform],
) -> anyhow::Result<()> {
    let outcomes = ctx.pipeline.publish_now(id, platforms).await?;
    print_json(&outcomes)?;
    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} publish attempts failed", outcomes.len());
    }
    Ok(())
}

pub(crate) async fn run_trigger(ctx: &Context, job: &str) -> anyhow::Result<()> {
    let report = ctx.scheduler.trigger(job).await?;
    print_json(&report)?;
    if let Some(error) = &report.error {
        anyhow::bail!("job {} failed: {error}", report.job);
    }
    Ok(())
}
