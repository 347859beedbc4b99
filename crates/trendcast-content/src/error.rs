use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The text backend answered, but not with what was asked for.
    #[error("malformed generator output: {0}")]
    Malformed(String),

    #[error("text generation timed out after {0}s")]
    Timeout(u64),

    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error(transparent)]
    Storage(#[from] trendcast_db::DbError),
}
