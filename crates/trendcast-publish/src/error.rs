use thiserror::Error;
use trendcast_core::Platform;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    /// The platform answered with an error payload.
    #[error("{platform} API error: {message}")]
    Api { platform: Platform, message: String },

    #[error("no sender configured for {0}")]
    NoSender(Platform),

    #[error(transparent)]
    Storage(#[from] trendcast_db::DbError),
}
