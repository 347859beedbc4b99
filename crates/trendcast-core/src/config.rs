use chrono::NaiveTime;

use crate::app_config::{AppConfig, Environment};
use crate::post::Platform;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Parse an `HH:MM` wall-clock time.
///
/// # Errors
///
/// Returns the chrono parse error as a string when the input is not `HH:MM`.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| format!("'{raw}': {e}"))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required vars are missing or values are invalid.
#[allow(clippy::too_many_lines)]
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(var, "must be a finite number".to_string()))
        }
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let parse_time = |var: &str, default: &str| -> Result<NaiveTime, ConfigError> {
        parse_clock_time(&or_default(var, default)).map_err(|reason| invalid(var, reason))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("TRENDCAST_ENV", "development"))?;

    let bind_addr = parse("TRENDCAST_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("TRENDCAST_LOG_LEVEL", "info");
    let watchlist_path = PathBuf::from(or_default(
        "TRENDCAST_WATCHLIST_PATH",
        "./config/watchlist.yaml",
    ));

    let db_max_connections = parse_u32("TRENDCAST_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TRENDCAST_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TRENDCAST_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let collector_timeout_secs = parse_u64("TRENDCAST_COLLECTOR_TIMEOUT_SECS", "10")?;
    let sender_timeout_secs = parse_u64("TRENDCAST_SENDER_TIMEOUT_SECS", "30")?;
    let text_gen_timeout_secs = parse_u64("TRENDCAST_TEXT_GEN_TIMEOUT_SECS", "60")?;

    let collect_interval_mins = parse_u64("TRENDCAST_COLLECT_INTERVAL_MINS", "30")?;
    let analytics_interval_mins = parse_u64("TRENDCAST_ANALYTICS_INTERVAL_MINS", "60")?;
    for (var, value) in [
        ("TRENDCAST_COLLECT_INTERVAL_MINS", collect_interval_mins),
        ("TRENDCAST_ANALYTICS_INTERVAL_MINS", analytics_interval_mins),
    ] {
        if value == 0 {
            return Err(invalid(var, "interval must be at least one minute".to_string()));
        }
    }

    let auto_post_enabled = parse_bool("TRENDCAST_AUTO_POST_ENABLED", "false")?;
    let auto_post_times = parse_times(
        "TRENDCAST_AUTO_POST_TIMES",
        &or_default("TRENDCAST_AUTO_POST_TIMES", "08:00,12:00,17:00,20:00,22:00"),
    )?;
    let auto_post_window_mins = parse_i64("TRENDCAST_AUTO_POST_WINDOW_MINS", "10")?;
    let auto_post_fallback = parse_bool("TRENDCAST_AUTO_POST_FALLBACK", "true")?;
    let default_platform = or_default("TRENDCAST_DEFAULT_PLATFORM", "facebook")
        .parse::<Platform>()
        .map_err(|e| invalid("TRENDCAST_DEFAULT_PLATFORM", e.to_string()))?;

    let daily_plan_time = parse_time("TRENDCAST_DAILY_PLAN_TIME", "07:00")?;
    let posts_per_day = usize::try_from(parse_u32("TRENDCAST_POSTS_PER_DAY", "5")?)
        .map_err(|e| invalid("TRENDCAST_POSTS_PER_DAY", e.to_string()))?;

    let utc_offset_hours = or_default("TRENDCAST_UTC_OFFSET_HOURS", "0")
        .parse::<i32>()
        .map_err(|e| invalid("TRENDCAST_UTC_OFFSET_HOURS", e.to_string()))?;
    if !(-12..=14).contains(&utc_offset_hours) {
        return Err(invalid(
            "TRENDCAST_UTC_OFFSET_HOURS",
            format!("{utc_offset_hours} is outside -12..=14"),
        ));
    }

    let momentum_floor = parse_f64("TRENDCAST_MOMENTUM_FLOOR", "0.0")?;
    let deactivation_hours = parse_i64("TRENDCAST_DEACTIVATION_HOURS", "6")?;
    if deactivation_hours <= 0 {
        return Err(invalid(
            "TRENDCAST_DEACTIVATION_HOURS",
            "must be positive".to_string(),
        ));
    }

    let user_agent = or_default("TRENDCAST_USER_AGENT", "trendcast/0.1 (trend-pipeline)");
    let ollama_url = optional("OLLAMA_URL");
    let ollama_model = or_default("OLLAMA_MODEL", "llama3.2");
    let facebook_page_id = optional("FACEBOOK_PAGE_ID");
    let facebook_access_token = optional("FACEBOOK_ACCESS_TOKEN");
    let x_bearer_token = optional("X_BEARER_TOKEN");
    let api_keys = parse_list(&or_default("TRENDCAST_API_KEYS", ""));

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        watchlist_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        collector_timeout_secs,
        sender_timeout_secs,
        text_gen_timeout_secs,
        collect_interval_mins,
        analytics_interval_mins,
        auto_post_enabled,
        auto_post_times,
        auto_post_window_mins,
        auto_post_fallback,
        default_platform,
        daily_plan_time,
        posts_per_day,
        utc_offset_hours,
        momentum_floor,
        deactivation_hours,
        user_agent,
        ollama_url,
        ollama_model,
        facebook_page_id,
        facebook_access_token,
        x_bearer_token,
        api_keys,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TRENDCAST_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Split a comma-separated list, dropping blanks and duplicates.
fn parse_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|seen| seen == item) {
            items.push(item.to_string());
        }
    }
    items
}

/// Parse a comma-separated list of `HH:MM` times, sorted and deduplicated.
fn parse_times(var: &str, raw: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    let mut times = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_clock_time(s).map_err(|reason| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    times.sort_unstable();
    times.dedup();
    Ok(times)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
