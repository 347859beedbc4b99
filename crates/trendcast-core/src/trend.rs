use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::string_enum;

/// Score label derived from the viral score thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Urgent,
    Rising,
    Emerging,
    Low,
}

string_enum!(ScoreBand, "score band", {
    Urgent => "urgent",
    Rising => "rising",
    Emerging => "emerging",
    Low => "low",
});

/// Coarse urgency bucket shared by trends and candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

string_enum!(Priority, "priority", {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStatus {
    Rising,
    Peak,
    Declining,
    Dead,
}

string_enum!(TrendStatus, "trend status", {
    Rising => "rising",
    Peak => "peak",
    Declining => "declining",
    Dead => "dead",
});

/// Mention volume reported by a single signal source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetrics {
    pub mentions: i64,
    pub velocity: f64,
}

/// A high-engagement sample post kept as evidence for a trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSample {
    pub source: String,
    pub text: String,
    pub url: Option<String>,
    pub engagement: i64,
}

/// A detected trend as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub id: i64,
    pub keyword: String,
    pub category: String,
    pub viral_score: f64,
    pub momentum_score: f64,
    pub mention_count: i64,
    pub velocity: f64,
    pub total_engagement: i64,
    pub sentiment_score: f64,
    pub celebrity: bool,
    pub source_metrics: BTreeMap<String, SourceMetrics>,
    pub band: ScoreBand,
    pub status: TrendStatus,
    pub priority: Priority,
    pub is_active: bool,
    pub detected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub peak_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub low_momentum_since: Option<DateTime<Utc>>,
    pub related_keywords: Vec<String>,
    pub top_samples: Vec<TopSample>,
}

/// Values written by one scoring pass, keyed by `keyword`.
///
/// `detected_at` is only set on insert; `peak_at` is never overwritten once
/// stamped.
#[derive(Debug, Clone)]
pub struct TrendUpsert {
    pub keyword: String,
    pub category: String,
    pub viral_score: f64,
    pub momentum_score: f64,
    pub mention_count: i64,
    pub velocity: f64,
    pub total_engagement: i64,
    pub sentiment_score: f64,
    pub celebrity: bool,
    pub source_metrics: BTreeMap<String, SourceMetrics>,
    pub band: ScoreBand,
    pub status: TrendStatus,
    pub priority: Priority,
    pub seen_at: DateTime<Utc>,
    pub peak_at: Option<DateTime<Utc>>,
    pub low_momentum_since: Option<DateTime<Utc>>,
    pub related_keywords: Vec<String>,
    pub top_samples: Vec<TopSample>,
}
