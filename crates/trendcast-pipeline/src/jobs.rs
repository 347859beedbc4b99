//! The recurring jobs and the handlers that run them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    CollectSignals,
    AutoPost,
    RefreshAnalytics,
    DailyPlan,
}

impl JobKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::CollectSignals => "collect_signals",
            JobKind::AutoPost => "auto_post",
            JobKind::RefreshAnalytics => "refresh_analytics",
            JobKind::DailyPlan => "daily_plan",
        }
    }

    /// Human label used in scheduler log lines.
    fn label(self) -> &'static str {
        match self {
            JobKind::CollectSignals => "signal collection",
            JobKind::AutoPost => "auto-post",
            JobKind::RefreshAnalytics => "analytics refresh",
            JobKind::DailyPlan => "daily content plan",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one job run did.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: String,
    pub kind: JobKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub summary: serde_json::Value,
    pub error: Option<String>,
}

/// Runs jobs against a shared pipeline. Job failures are logged and
/// reported, never propagated to the scheduler.
#[derive(Clone)]
pub struct JobHandlers {
    pipeline: Arc<Pipeline>,
}

impl JobHandlers {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub async fn run(&self, name: &str, kind: JobKind) -> JobReport {
        let started_at = Utc::now();
        tracing::info!(job = name, "scheduler: starting {} run", kind.label());

        let result = self.dispatch(kind, started_at).await;
        let finished_at = Utc::now();
        match result {
            Ok(summary) => {
                tracing::info!(job = name, "scheduler: {} run complete", kind.label());
                JobReport {
                    job: name.to_string(),
                    kind,
                    started_at,
                    finished_at,
                    success: true,
                    summary,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(job = name, error = %e, "scheduler: {} run failed", kind.label());
                JobReport {
                    job: name.to_string(),
                    kind,
                    started_at,
                    finished_at,
                    success: false,
                    summary: serde_json::Value::Null,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn dispatch(
        &self,
        kind: JobKind,
        now: DateTime<Utc>,
    ) -> Result<serde_json::Value, PipelineError> {
        let p = &self.pipeline;
        Ok(match kind {
            JobKind::CollectSignals => summarize(&p.collect_signals(now).await?),
            JobKind::AutoPost => summarize(&p.auto_post(now).await?),
            JobKind::RefreshAnalytics => summarize(&p.refresh_analytics(now).await?),
            JobKind::DailyPlan => summarize(&p.daily_plan(now).await?),
        })
    }
}

fn summarize<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
