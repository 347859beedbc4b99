//! Orchestration: the pipeline facade over storage, signals, content and
//! publishing, plus the background job scheduler that drives it.

pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod scheduler;

pub use error::PipelineError;
pub use jobs::{JobHandlers, JobKind, JobReport};
pub use pipeline::{
    AnalyticsSummary, AutoPostSummary, CollectSummary, DailyPlanSummary, Pipeline,
    MAX_CANDIDATES_PER_CALL,
};
pub use scheduler::{daily_cron, Cadence, JobDefinition, JobStatus, PipelineScheduler};
pub use trendcast_publish::PublishOutcome;
pub use trendcast_signals::{DetectionReport, ViralPrediction};
