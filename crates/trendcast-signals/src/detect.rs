//! Trend detection: collect, score, rank, persist, and retire trends.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use trendcast_core::{AppConfig, ScoreBand, Trend, TrendStatus, TrendUpsert, Watchlist};
use trendcast_db::Repository;

use crate::error::SignalError;
use crate::scorer::{rank_by_score, score, ScoreInput, ViralScore};
use crate::sources::{collect_signals, KeywordSignal, SignalSource};

const MAX_TOP_SAMPLES: usize = 5;
const CONTENT_SCORE_THRESHOLD: f64 = 60.0;

/// When trends are retired, and how long collectors may take.
#[derive(Debug, Clone, Copy)]
pub struct DetectionPolicy {
    /// Momentum (mentions per hour) below which a trend counts as fading.
    pub momentum_floor: f64,
    /// How long a trend may fade, or go unseen, before it is deactivated.
    pub deactivation_window: chrono::Duration,
    pub collector_timeout: Duration,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            momentum_floor: 0.0,
            deactivation_window: chrono::Duration::hours(6),
            collector_timeout: Duration::from_secs(10),
        }
    }
}

impl DetectionPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            momentum_floor: config.momentum_floor,
            deactivation_window: chrono::Duration::hours(config.deactivation_hours),
            collector_timeout: Duration::from_secs(config.collector_timeout_secs),
        }
    }
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionReport {
    pub keywords_with_signal: usize,
    /// Trends written this pass, highest score first.
    pub trends: Vec<Trend>,
    pub deactivated: Vec<i64>,
    /// Keywords whose upsert failed, with the error.
    pub failures: Vec<(String, String)>,
}

/// Compute the row written for `signal` given the stored trend, if any.
///
/// Momentum is the change in mention count since the previous pass, per
/// hour. A trend whose band is urgent is at its peak; otherwise negative
/// momentum marks it declining.
#[must_use]
pub fn plan_trend_update(
    existing: Option<&Trend>,
    signal: &KeywordSignal,
    scored: &ViralScore,
    watchlist: &Watchlist,
    policy: &DetectionPolicy,
    now: DateTime<Utc>,
) -> TrendUpsert {
    let momentum = existing.map_or(0.0, |prev| momentum(prev, signal.mention_count, now));

    let status = if scored.band == ScoreBand::Urgent {
        TrendStatus::Peak
    } else if momentum < 0.0 {
        TrendStatus::Declining
    } else {
        TrendStatus::Rising
    };

    let peak_at = existing
        .and_then(|prev| prev.peak_at)
        .or((status == TrendStatus::Peak).then_some(now));

    let low_momentum_since = if momentum < policy.momentum_floor {
        existing
            .and_then(|prev| prev.low_momentum_since)
            .or(Some(now))
    } else {
        None
    };

    let watched = watchlist.find(&signal.keyword);
    let category = watched.map_or_else(|| "general".to_string(), |w| w.category.clone());
    let related_keywords = watched.map(|w| w.related.clone()).unwrap_or_default();

    TrendUpsert {
        keyword: signal.keyword.clone(),
        category,
        viral_score: scored.score,
        momentum_score: momentum,
        mention_count: signal.mention_count,
        velocity: signal.velocity,
        total_engagement: signal.total_engagement(),
        sentiment_score: signal.sentiment.unwrap_or(0.0).clamp(-1.0, 1.0),
        celebrity: involves_celebrity(signal, watchlist),
        source_metrics: signal.source_metrics.clone(),
        band: scored.band,
        status,
        priority: scored.priority,
        seen_at: now,
        peak_at,
        low_momentum_since,
        related_keywords,
        top_samples: signal.samples.iter().take(MAX_TOP_SAMPLES).cloned().collect(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn momentum(prev: &Trend, mentions: i64, now: DateTime<Utc>) -> f64 {
    let hours = (now - prev.last_seen_at).num_seconds() as f64 / 3600.0;
    if hours <= 0.0 {
        return 0.0;
    }
    (mentions - prev.mention_count) as f64 / hours
}

fn involves_celebrity(signal: &KeywordSignal, watchlist: &Watchlist) -> bool {
    watchlist.mentions_celebrity(&signal.keyword)
        || watchlist
            .find(&signal.keyword)
            .is_some_and(|w| w.related.iter().any(|r| watchlist.mentions_celebrity(r)))
}

/// Build the scorer input for a merged signal.
#[must_use]
pub fn score_input(signal: &KeywordSignal, watchlist: &Watchlist) -> ScoreInput {
    ScoreInput {
        mentions: Some(signal.mention_count),
        velocity: Some(signal.velocity),
        engagement: (!signal.samples.is_empty()).then(|| signal.total_engagement()),
        celebrity: involves_celebrity(signal, watchlist),
        sentiment: signal.sentiment,
    }
}

/// Whether a trend should be retired at `now`.
#[must_use]
pub fn should_deactivate(trend: &Trend, policy: &DetectionPolicy, now: DateTime<Utc>) -> bool {
    if !trend.is_active {
        return false;
    }
    let unseen = now - trend.last_seen_at >= policy.deactivation_window;
    let faded = trend
        .low_momentum_since
        .is_some_and(|since| now - since >= policy.deactivation_window);
    unseen || faded
}

/// Whether a trend is hot enough to generate content for.
#[must_use]
pub fn should_create_content(trend: &Trend) -> bool {
    trend.is_active
        && trend.viral_score >= CONTENT_SCORE_THRESHOLD
        && matches!(trend.band, ScoreBand::Rising | ScoreBand::Urgent)
}

/// Run one detection pass over every watchlist keyword.
///
/// Keywords with no mentions are not detections. Each trend is written with
/// a single upsert; a failed upsert is recorded and the pass continues.
///
/// # Errors
///
/// Returns [`SignalError::Storage`] if the active trends cannot be read or a
/// trend cannot be deactivated during the sweep.
pub async fn detect_trends(
    repo: &dyn Repository,
    sources: &[Arc<dyn SignalSource>],
    watchlist: &Watchlist,
    policy: &DetectionPolicy,
    now: DateTime<Utc>,
) -> Result<DetectionReport, SignalError> {
    let mut signals: Vec<KeywordSignal> =
        collect_signals(sources, &watchlist.keywords, policy.collector_timeout)
            .await
            .into_iter()
            .filter(|s| s.mention_count > 0)
            .collect();

    let mut report = DetectionReport {
        keywords_with_signal: signals.len(),
        ..DetectionReport::default()
    };

    let mut scored: Vec<(KeywordSignal, ViralScore)> = signals
        .drain(..)
        .map(|signal| {
            let result = score(&score_input(&signal, watchlist));
            (signal, result)
        })
        .collect();
    rank_by_score(&mut scored, |(_, s)| s.score);

    for (signal, result) in &scored {
        let existing = match repo.find_trend_by_keyword(&signal.keyword).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(keyword = %signal.keyword, error = %e, "trend lookup failed");
                report.failures.push((signal.keyword.clone(), e.to_string()));
                continue;
            }
        };
        let upsert = plan_trend_update(existing.as_ref(), signal, result, watchlist, policy, now);
        match repo.upsert_trend(&upsert).await {
            Ok(trend) => {
                tracing::debug!(
                    keyword = %trend.keyword,
                    score = trend.viral_score,
                    band = %trend.band,
                    "trend updated"
                );
                report.trends.push(trend);
            }
            Err(e) => {
                tracing::warn!(keyword = %signal.keyword, error = %e, "trend upsert failed");
                report.failures.push((signal.keyword.clone(), e.to_string()));
            }
        }
    }

    for trend in repo.list_active_trends().await? {
        if should_deactivate(&trend, policy, now) {
            repo.deactivate_trend(trend.id, now).await?;
            tracing::info!(keyword = %trend.keyword, trend_id = trend.id, "trend deactivated");
            report.deactivated.push(trend.id);
        }
    }

    tracing::info!(
        signals = report.keywords_with_signal,
        trends = report.trends.len(),
        deactivated = report.deactivated.len(),
        failures = report.failures.len(),
        "trend detection complete"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "detect_test.rs"]
mod tests;
