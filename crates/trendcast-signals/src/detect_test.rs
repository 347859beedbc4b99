use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use trendcast_core::{
    Priority, ScoreBand, SourceMetrics, TopSample, TrendStatus, WatchKeyword, Watchlist,
};
use trendcast_db::{MemoryRepository, Repository};

use super::*;
use crate::sources::RawSignal;

/// Source whose next answer can be swapped between passes.
struct Scripted {
    signals: Mutex<Vec<RawSignal>>,
}

impl Scripted {
    fn new(signals: Vec<RawSignal>) -> Arc<Self> {
        Arc::new(Self {
            signals: Mutex::new(signals),
        })
    }

    fn set(&self, signals: Vec<RawSignal>) {
        *self.signals.lock().unwrap() = signals;
    }
}

#[async_trait]
impl SignalSource for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, _: &[WatchKeyword]) -> Result<Vec<RawSignal>, SignalError> {
        Ok(self.signals.lock().unwrap().clone())
    }
}

fn watchlist() -> Watchlist {
    Watchlist {
        keywords: vec![
            WatchKeyword {
                keyword: "Ronaldo".to_string(),
                category: "player".to_string(),
                related: vec!["CR7".to_string()],
            },
            WatchKeyword {
                keyword: "VAR".to_string(),
                category: "controversy".to_string(),
                related: vec![],
            },
        ],
        celebrities: vec!["Ronaldo".to_string()],
        ..Watchlist::default()
    }
}

fn raw(keyword: &str, mentions: i64, velocity: f64, engagement: i64, sentiment: f64) -> RawSignal {
    RawSignal {
        keyword: keyword.to_string(),
        source: "scripted".to_string(),
        mention_count: mentions,
        velocity,
        samples: vec![TopSample {
            source: "scripted".to_string(),
            text: format!("{keyword} clip"),
            url: Some("https://example.com/clip".to_string()),
            engagement,
        }],
        sentiment: Some(sentiment),
    }
}

fn keyword_signal(keyword: &str, mentions: i64) -> KeywordSignal {
    let mut source_metrics = BTreeMap::new();
    source_metrics.insert(
        "reddit".to_string(),
        SourceMetrics {
            mentions,
            velocity: 1.0,
        },
    );
    KeywordSignal {
        keyword: keyword.to_string(),
        mention_count: mentions,
        velocity: 1.0,
        samples: vec![],
        sentiment: None,
        source_metrics,
    }
}

fn stored_trend(mentions: i64, last_seen_hours_ago: i64) -> Trend {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    Trend {
        id: 1,
        keyword: "VAR".to_string(),
        category: "controversy".to_string(),
        viral_score: 45.0,
        momentum_score: 0.0,
        mention_count: mentions,
        velocity: 1.0,
        total_engagement: 0,
        sentiment_score: 0.0,
        celebrity: false,
        source_metrics: BTreeMap::new(),
        band: ScoreBand::Emerging,
        status: TrendStatus::Rising,
        priority: Priority::Normal,
        is_active: true,
        detected_at: now - Duration::hours(10),
        last_seen_at: now - Duration::hours(last_seen_hours_ago),
        peak_at: None,
        ended_at: None,
        low_momentum_since: None,
        related_keywords: vec![],
        top_samples: vec![],
    }
}

fn emerging() -> ViralScore {
    score(&ScoreInput {
        mentions: Some(600),
        velocity: Some(12.0),
        ..ScoreInput::default()
    })
}

#[test]
fn first_detection_has_zero_momentum() {
    let now = Utc::now();
    let plan = plan_trend_update(
        None,
        &keyword_signal("VAR", 300),
        &emerging(),
        &watchlist(),
        &DetectionPolicy::default(),
        now,
    );
    assert!(plan.momentum_score.abs() < f64::EPSILON);
    assert_eq!(plan.status, TrendStatus::Rising);
    assert_eq!(plan.category, "controversy");
    assert!(plan.low_momentum_since.is_none());
}

#[test]
fn momentum_is_mentions_per_hour() {
    let prev = stored_trend(100, 2);
    let now = prev.last_seen_at + Duration::hours(2);
    let plan = plan_trend_update(
        Some(&prev),
        &keyword_signal("VAR", 300),
        &emerging(),
        &watchlist(),
        &DetectionPolicy::default(),
        now,
    );
    assert!((plan.momentum_score - 100.0).abs() < 1e-9);
    assert_eq!(plan.status, TrendStatus::Rising);
}

#[test]
fn falling_mentions_mark_declining_and_start_low_momentum_clock() {
    let prev = stored_trend(500, 1);
    let now = prev.last_seen_at + Duration::hours(1);
    let plan = plan_trend_update(
        Some(&prev),
        &keyword_signal("VAR", 200),
        &emerging(),
        &watchlist(),
        &DetectionPolicy::default(),
        now,
    );
    assert!(plan.momentum_score < 0.0);
    assert_eq!(plan.status, TrendStatus::Declining);
    assert_eq!(plan.low_momentum_since, Some(now));

    let mut faded = prev.clone();
    faded.low_momentum_since = Some(now - Duration::hours(3));
    let plan = plan_trend_update(
        Some(&faded),
        &keyword_signal("VAR", 200),
        &emerging(),
        &watchlist(),
        &DetectionPolicy::default(),
        now,
    );
    assert_eq!(plan.low_momentum_since, faded.low_momentum_since);
}

#[test]
fn urgent_band_reaches_peak_once() {
    let urgent = score(&ScoreInput {
        mentions: Some(1500),
        velocity: Some(25.0),
        engagement: Some(8200),
        celebrity: true,
        sentiment: Some(0.9),
    });
    let now = Utc::now();
    let plan = plan_trend_update(
        None,
        &keyword_signal("Ronaldo", 1500),
        &urgent,
        &watchlist(),
        &DetectionPolicy::default(),
        now,
    );
    assert_eq!(plan.status, TrendStatus::Peak);
    assert_eq!(plan.peak_at, Some(now));

    let mut prev = stored_trend(1500, 1);
    let first_peak = now - Duration::hours(1);
    prev.peak_at = Some(first_peak);
    let plan = plan_trend_update(
        Some(&prev),
        &keyword_signal("Ronaldo", 1600),
        &urgent,
        &watchlist(),
        &DetectionPolicy::default(),
        now,
    );
    assert_eq!(plan.peak_at, Some(first_peak));
}

#[test]
fn deactivation_covers_unseen_and_faded_trends() {
    let policy = DetectionPolicy::default();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    assert!(!should_deactivate(&stored_trend(10, 5), &policy, now));
    assert!(should_deactivate(&stored_trend(10, 6), &policy, now));

    let mut faded = stored_trend(10, 0);
    faded.low_momentum_since = Some(now - Duration::hours(6));
    assert!(should_deactivate(&faded, &policy, now));
    faded.low_momentum_since = Some(now - Duration::hours(2));
    assert!(!should_deactivate(&faded, &policy, now));
}

#[test]
fn content_gate_needs_score_band_and_activity() {
    let mut trend = stored_trend(10, 0);
    trend.viral_score = 65.0;
    trend.band = ScoreBand::Rising;
    assert!(should_create_content(&trend));

    trend.band = ScoreBand::Emerging;
    assert!(!should_create_content(&trend));

    trend.band = ScoreBand::Urgent;
    trend.is_active = false;
    assert!(!should_create_content(&trend));

    trend.is_active = true;
    trend.viral_score = 59.9;
    assert!(!should_create_content(&trend));
}

#[tokio::test]
async fn detection_pass_upserts_ranks_and_retires() {
    let repo = MemoryRepository::new();
    let source = Scripted::new(vec![
        raw("VAR", 150, 6.0, 500, 0.0),
        raw("Ronaldo", 1500, 25.0, 8200, 0.9),
        raw("Nobody", 0, 0.0, 0, 0.0),
    ]);
    let sources: Vec<Arc<dyn SignalSource>> = vec![source.clone()];
    let policy = DetectionPolicy::default();
    let start = Utc::now();

    let report = detect_trends(&repo, &sources, &watchlist(), &policy, start)
        .await
        .expect("detection should succeed");

    assert_eq!(report.keywords_with_signal, 2);
    let keywords: Vec<&str> = report.trends.iter().map(|t| t.keyword.as_str()).collect();
    assert_eq!(keywords, vec!["Ronaldo", "VAR"]);
    let ronaldo = &report.trends[0];
    assert!((ronaldo.viral_score - 95.0).abs() < f64::EPSILON);
    assert!(ronaldo.celebrity);
    assert_eq!(ronaldo.status, TrendStatus::Peak);
    assert_eq!(ronaldo.related_keywords, vec!["CR7".to_string()]);

    // Later pass: only Ronaldo is seen again; VAR has gone quiet too long.
    source.set(vec![raw("Ronaldo", 1700, 25.0, 9000, 0.9)]);
    let later = start + Duration::hours(7);
    let report = detect_trends(&repo, &sources, &watchlist(), &policy, later)
        .await
        .expect("detection should succeed");

    assert_eq!(report.deactivated.len(), 1);
    let active = repo.list_active_trends().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].keyword, "Ronaldo");
    assert_eq!(active[0].detected_at, start);
    let var = repo.find_trend_by_keyword("VAR").await.unwrap().unwrap();
    assert_eq!(var.status, TrendStatus::Dead);
}

#[tokio::test]
async fn storage_outage_during_sweep_is_an_error() {
    let repo = MemoryRepository::new();
    repo.set_unavailable(true);
    let sources: Vec<Arc<dyn SignalSource>> =
        vec![Scripted::new(vec![raw("VAR", 150, 6.0, 500, 0.0)])];

    let result = detect_trends(
        &repo,
        &sources,
        &watchlist(),
        &DetectionPolicy::default(),
        Utc::now(),
    )
    .await;

    assert!(matches!(result, Err(SignalError::Storage(_))));
}
