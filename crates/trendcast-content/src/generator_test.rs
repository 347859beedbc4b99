use std::collections::BTreeMap;

use chrono::TimeZone;
use rand::rngs::StdRng;
use trendcast_core::{ScoreBand, TrendStatus, TrendUpsert};
use trendcast_db::MemoryRepository;

use super::*;

fn trend(viral_score: f64, sentiment: f64) -> Trend {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    Trend {
        id: 7,
        keyword: "Man United".to_string(),
        category: "club".to_string(),
        viral_score,
        momentum_score: 0.0,
        mention_count: 900,
        velocity: 12.0,
        total_engagement: 4000,
        sentiment_score: sentiment,
        celebrity: false,
        source_metrics: BTreeMap::new(),
        band: ScoreBand::Rising,
        status: TrendStatus::Rising,
        priority: Priority::High,
        is_active: true,
        detected_at: now,
        last_seen_at: now,
        peak_at: None,
        ended_at: None,
        low_momentum_since: None,
        related_keywords: vec![],
        top_samples: vec![],
    }
}

fn seeded() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[test]
fn type_lists_follow_score_bands() {
    assert_eq!(select_types(85.0, 0.0).len(), 6);
    assert_eq!(select_types(70.0, 0.0)[0], ContentType::HotTake);
    assert_eq!(
        select_types(30.0, 0.0),
        vec![
            ContentType::News,
            ContentType::FanOpinion,
            ContentType::Meme,
            ContentType::Analysis
        ]
    );
}

#[test]
fn strongly_negative_sentiment_leads_with_hot_take() {
    let candidates = plan_candidates(
        &trend(85.0, -0.5),
        4,
        Utc::now(),
        utc(),
        &mut seeded(),
    );
    assert_eq!(candidates.len(), 4);
    assert_eq!(candidates[0].content_type, ContentType::HotTake);
    assert_eq!(candidates[0].tone, Tone::Sarcastic);
    assert_eq!(candidates[1].content_type, ContentType::Meme);
}

#[test]
fn positive_sentiment_inserts_fan_opinion_second() {
    let types = select_types(30.0, 0.7);
    assert_eq!(types[1], ContentType::FanOpinion);
    assert_eq!(types.len(), 4);
}

#[test]
fn count_is_capped_at_twice_the_type_list() {
    let mut rng = seeded();
    let now = Utc::now();
    assert_eq!(plan_candidates(&trend(85.0, 0.0), 20, now, utc(), &mut rng).len(), 12);
    assert_eq!(plan_candidates(&trend(50.0, 0.0), 20, now, utc(), &mut rng).len(), 8);
    assert_eq!(plan_candidates(&trend(50.0, 0.0), 3, now, utc(), &mut rng).len(), 3);
    assert!(plan_candidates(&trend(50.0, 0.0), 0, now, utc(), &mut rng).is_empty());
}

#[test]
fn padded_candidates_form_ab_pairs() {
    let candidates = plan_candidates(&trend(50.0, 0.0), 6, Utc::now(), utc(), &mut seeded());
    assert_eq!(candidates.len(), 6);

    // Types: news, fan_opinion, meme, analysis; the first two get a B variant.
    for (a, b) in [(0, 4), (1, 5)] {
        assert_eq!(candidates[a].ab_group.as_deref(), Some("A"));
        assert_eq!(candidates[b].ab_group.as_deref(), Some("B"));
        assert_eq!(candidates[a].content_type, candidates[b].content_type);
        assert!(candidates[a].ab_test_id.is_some());
        assert_eq!(candidates[a].ab_test_id, candidates[b].ab_test_id);
    }
    assert_ne!(candidates[0].ab_test_id, candidates[1].ab_test_id);
    assert!(candidates[2].ab_group.is_none());
    assert!(candidates[3].ab_test_id.is_none());
}

#[test]
fn predictions_stay_in_range() {
    let mut rng = seeded();
    for score in [0.0, 35.0, 61.0, 85.0, 100.0] {
        for sentiment in [-0.9, 0.0, 0.9] {
            for c in plan_candidates(&trend(score, sentiment), 12, Utc::now(), utc(), &mut rng) {
                assert!((0.0..=100.0).contains(&c.viral_prediction_score));
                assert!(c.engagement_prediction >= 0.0);
            }
        }
    }
    assert!((predict_score(100.0, ContentType::Meme, Tone::Humorous, 1, 1.05) - 100.0).abs() < 1e-9);
}

#[test]
fn engagement_rounds_to_cents() {
    // 70 * 0.05 * 1.5 = 5.25
    assert!((predict_engagement(70.0, ContentType::Meme) - 5.25).abs() < 1e-9);
    assert!((predict_engagement(33.4, ContentType::News) - 1.67).abs() < 1e-9);
}

#[test]
fn templates_substitute_the_keyword() {
    for c in plan_candidates(&trend(85.0, 0.5), 12, Utc::now(), utc(), &mut seeded()) {
        assert!(c.title.contains("Man United") || c.body.contains("Man United"));
        assert!(!c.title.contains("{keyword}") && !c.body.contains("{emoji}"));
        assert_eq!(c.hashtags[0], "#ManUnited");
        assert!(c.hashtags.len() <= 8);
        assert!(c.image_keywords.len() <= 6);
        assert_eq!(c.image_keywords[0], "Man United");
    }
}

#[test]
fn hot_trends_post_now_warm_ones_within_the_hour() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut rng = seeded();
    assert_eq!(best_posting_time(85.0, now, utc(), &mut rng), Some(now));

    for _ in 0..20 {
        let at = best_posting_time(65.0, now, utc(), &mut rng).unwrap();
        assert!(at >= now + Duration::minutes(15));
        assert!(at <= now + Duration::minutes(60));
    }
}

#[test]
fn cool_trends_wait_for_the_next_local_peak() {
    let plus7 = FixedOffset::east_opt(7 * 3600).unwrap();
    let mut rng = seeded();

    // 10:30 local -> 12:00 local the same day.
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 3, 30, 0).unwrap();
    assert_eq!(
        best_posting_time(40.0, now, plus7, &mut rng),
        Some(Utc.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap())
    );

    // 18:00 local is not strictly after 18 -> 21:00 local.
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();
    assert_eq!(
        best_posting_time(40.0, now, plus7, &mut rng),
        Some(Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap())
    );

    // 22:00 local rolls to 12:00 local tomorrow.
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
    assert_eq!(
        best_posting_time(40.0, now, plus7, &mut rng),
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 5, 0, 0).unwrap())
    );
}

#[test]
fn priority_uses_the_average_of_prediction_and_trend() {
    assert_eq!(candidate_priority(90.0, 80.0), Priority::Urgent);
    assert_eq!(candidate_priority(60.0, 70.0), Priority::High);
    assert_eq!(candidate_priority(30.0, 50.0), Priority::Normal);
    assert_eq!(candidate_priority(10.0, 20.0), Priority::Low);
}

async fn stored_trend(repo: &MemoryRepository) -> Trend {
    let now = Utc::now();
    repo.upsert_trend(&TrendUpsert {
        keyword: "Haaland".to_string(),
        category: "player".to_string(),
        viral_score: 72.0,
        momentum_score: 0.0,
        mention_count: 700,
        velocity: 11.0,
        total_engagement: 3000,
        sentiment_score: 0.2,
        celebrity: true,
        source_metrics: BTreeMap::new(),
        band: ScoreBand::Rising,
        status: TrendStatus::Rising,
        priority: Priority::High,
        seen_at: now,
        peak_at: None,
        low_momentum_since: None,
        related_keywords: vec![],
        top_samples: vec![],
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn generated_batch_is_stored() {
    let repo = MemoryRepository::new();
    let trend = stored_trend(&repo).await;

    let stored = generate_candidates(&repo, &trend, 5, Utc::now(), utc())
        .await
        .expect("generation should succeed");

    assert_eq!(stored.len(), 5);
    assert_eq!(repo.candidate_count(), 5);
    assert!(stored.iter().all(|c| c.trend_id == trend.id));
    assert_eq!(stored[0].content_type, ContentType::HotTake);
}

#[tokio::test]
async fn failed_batch_leaves_nothing_behind() {
    let repo = MemoryRepository::new();
    let trend = stored_trend(&repo).await;
    repo.fail_candidate_insert_at(2);

    let result = generate_candidates(&repo, &trend, 5, Utc::now(), utc()).await;

    assert!(matches!(result, Err(ContentError::Storage(_))));
    assert_eq!(repo.candidate_count(), 0);
}
