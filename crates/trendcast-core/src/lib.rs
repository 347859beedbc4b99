//! Shared domain types and configuration for the trendcast pipeline.

mod app_config;
mod candidate;
mod config;
mod post;
mod trend;
mod watchlist;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use candidate::{
    CandidateEdit, CandidateStatus, ContentCandidate, ContentMetrics, ContentStats, ContentType,
    NewCandidate, Tone,
};
pub use config::{build_app_config, load_app_config, load_app_config_from_env, parse_clock_time};
pub use post::{
    NewNewsItem, NewPost, NewsItem, Platform, Post, PostEvent, PostStatus, PublishSchedule,
    ScheduleStatus,
};
pub use trend::{
    Priority, ScoreBand, SourceMetrics, TopSample, Trend, TrendStatus, TrendUpsert,
};
pub use watchlist::{load_watchlist, NewsFeed, WatchKeyword, Watchlist};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("post status {from} does not accept {event}")]
    InvalidTransition { from: PostStatus, event: PostEvent },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read watchlist file {path}: {source}")]
    WatchlistIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse watchlist file: {0}")]
    WatchlistParse(#[from] serde_yaml::Error),

    #[error("watchlist validation failed: {0}")]
    Validation(String),
}

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum whose
/// variants map one-to-one onto lowercase storage strings.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err($crate::CoreError::InvalidValue {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;
