use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;
use trendcast_content::ContentError;
use trendcast_db::DbError;
use trendcast_publish::PublishError;
use trendcast_signals::SignalError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(DbError),

    #[error(transparent)]
    Signals(SignalError),

    #[error(transparent)]
    Content(ContentError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

impl From<DbError> for PipelineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            DbError::InvalidTransition { .. } => PipelineError::Validation(e.to_string()),
            DbError::Conflict(message) => PipelineError::Conflict(message),
            other => PipelineError::Storage(other),
        }
    }
}

impl From<SignalError> for PipelineError {
    fn from(e: SignalError) -> Self {
        match e {
            SignalError::Storage(db) => db.into(),
            other => PipelineError::Signals(other),
        }
    }
}

impl From<ContentError> for PipelineError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::Storage(db) => db.into(),
            other => PipelineError::Content(other),
        }
    }
}
