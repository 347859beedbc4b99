use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    /// Network or TLS failure, or a non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("source {source_name} timed out after {secs}s")]
    Timeout { source_name: String, secs: u64 },

    #[error(transparent)]
    Storage(#[from] trendcast_db::DbError),
}
