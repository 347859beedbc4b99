//! Signal sources and the collector that fans out over them.

mod news;
mod reddit;

pub use news::{parse_feed, NewsFeedSource};
pub use reddit::RedditSource;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use trendcast_core::{SourceMetrics, TopSample, WatchKeyword};

use crate::error::SignalError;

/// Mentions of one keyword reported by one source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    pub keyword: String,
    pub source: String,
    pub mention_count: i64,
    /// Mentions per minute.
    pub velocity: f64,
    pub samples: Vec<TopSample>,
    pub sentiment: Option<f64>,
}

/// All sources' signals for one keyword, merged.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSignal {
    pub keyword: String,
    pub mention_count: i64,
    pub velocity: f64,
    pub samples: Vec<TopSample>,
    /// Mean over the sources that reported a sentiment.
    pub sentiment: Option<f64>,
    pub source_metrics: BTreeMap<String, SourceMetrics>,
}

impl KeywordSignal {
    /// Summed engagement of the collected samples.
    #[must_use]
    pub fn total_engagement(&self) -> i64 {
        self.samples.iter().map(|s| s.engagement.max(0)).sum()
    }
}

/// A place keyword mentions are counted.
#[async_trait]
pub trait SignalSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch mention signals for the given keywords.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] when the upstream cannot be reached or returns
    /// an unusable payload.
    async fn fetch(&self, keywords: &[WatchKeyword]) -> Result<Vec<RawSignal>, SignalError>;
}

/// Run every source under `timeout` and merge their signals by keyword.
///
/// Sources that fail or time out are logged and skipped. The result keeps
/// the order in which keywords were first reported.
pub async fn collect_signals(
    sources: &[Arc<dyn SignalSource>],
    keywords: &[WatchKeyword],
    timeout: Duration,
) -> Vec<KeywordSignal> {
    let fetches = sources.iter().map(|source| async move {
        let name = source.name().to_string();
        let result = match tokio::time::timeout(timeout, source.fetch(keywords)).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::Timeout {
                source_name: name.clone(),
                secs: timeout.as_secs(),
            }),
        };
        (name, result)
    });

    let mut raw = Vec::new();
    for (name, result) in join_all(fetches).await {
        match result {
            Ok(signals) => {
                tracing::debug!(source = %name, count = signals.len(), "collected signals");
                raw.extend(signals);
            }
            Err(e) => {
                tracing::warn!(source = %name, error = %e, "signal source failed; skipping");
            }
        }
    }

    merge_signals(raw)
}

/// Merge raw signals that share a keyword.
#[must_use]
pub fn merge_signals(raw: Vec<RawSignal>) -> Vec<KeywordSignal> {
    let mut merged: Vec<KeywordSignal> = Vec::new();
    let mut sentiments: Vec<Vec<f64>> = Vec::new();

    for signal in raw {
        let index = match merged.iter().position(|m| m.keyword == signal.keyword) {
            Some(index) => index,
            None => {
                merged.push(KeywordSignal {
                    keyword: signal.keyword.clone(),
                    mention_count: 0,
                    velocity: 0.0,
                    samples: Vec::new(),
                    sentiment: None,
                    source_metrics: BTreeMap::new(),
                });
                sentiments.push(Vec::new());
                merged.len() - 1
            }
        };

        let entry = &mut merged[index];
        let mentions = signal.mention_count.max(0);
        let velocity = if signal.velocity.is_finite() {
            signal.velocity.max(0.0)
        } else {
            0.0
        };
        entry.mention_count += mentions;
        entry.velocity += velocity;
        entry.samples.extend(signal.samples);

        let per_source = entry.source_metrics.entry(signal.source).or_default();
        per_source.mentions += mentions;
        per_source.velocity += velocity;

        if let Some(s) = signal.sentiment.filter(|s| s.is_finite()) {
            sentiments[index].push(s);
        }
    }

    for (entry, values) in merged.iter_mut().zip(sentiments) {
        if !values.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            entry.sentiment = Some(mean);
        }
        entry
            .samples
            .sort_by(|a, b| b.engagement.cmp(&a.engagement));
    }

    merged
}
