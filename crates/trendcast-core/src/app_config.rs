use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

use crate::post::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub watchlist_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub collector_timeout_secs: u64,
    pub sender_timeout_secs: u64,
    pub text_gen_timeout_secs: u64,
    pub collect_interval_mins: u64,
    pub analytics_interval_mins: u64,
    pub auto_post_enabled: bool,
    pub auto_post_times: Vec<NaiveTime>,
    pub auto_post_window_mins: i64,
    pub auto_post_fallback: bool,
    pub default_platform: Platform,
    pub daily_plan_time: NaiveTime,
    pub posts_per_day: usize,
    /// Offset of the operator's local time from UTC; peak hours and daily job
    /// times are interpreted in this zone.
    pub utc_offset_hours: i32,
    pub momentum_floor: f64,
    pub deactivation_hours: i64,
    pub user_agent: String,
    pub ollama_url: Option<String>,
    pub ollama_model: String,
    pub facebook_page_id: Option<String>,
    pub facebook_access_token: Option<String>,
    pub x_bearer_token: Option<String>,
    /// Bearer tokens accepted by the HTTP API; empty disables auth in development.
    pub api_keys: Vec<String>,
}

impl AppConfig {
    /// Whether the configured database URL selects the in-process store.
    #[must_use]
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }

    /// The configured local timezone as a fixed offset from UTC.
    #[must_use]
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("watchlist_path", &self.watchlist_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("collector_timeout_secs", &self.collector_timeout_secs)
            .field("sender_timeout_secs", &self.sender_timeout_secs)
            .field("text_gen_timeout_secs", &self.text_gen_timeout_secs)
            .field("collect_interval_mins", &self.collect_interval_mins)
            .field("analytics_interval_mins", &self.analytics_interval_mins)
            .field("auto_post_enabled", &self.auto_post_enabled)
            .field("auto_post_times", &self.auto_post_times)
            .field("auto_post_window_mins", &self.auto_post_window_mins)
            .field("auto_post_fallback", &self.auto_post_fallback)
            .field("default_platform", &self.default_platform)
            .field("daily_plan_time", &self.daily_plan_time)
            .field("posts_per_day", &self.posts_per_day)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("momentum_floor", &self.momentum_floor)
            .field("deactivation_hours", &self.deactivation_hours)
            .field("user_agent", &self.user_agent)
            .field("ollama_url", &self.ollama_url)
            .field("ollama_model", &self.ollama_model)
            .field("facebook_page_id", &self.facebook_page_id)
            .field(
                "facebook_access_token",
                &self.facebook_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "x_bearer_token",
                &self.x_bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("api_keys", &format!("[{} redacted]", self.api_keys.len()))
            .finish()
    }
}
