use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use trendcast_core::{
    CandidateEdit, CandidateStatus, ContentMetrics, ContentType, NewCandidate, NewNewsItem,
    NewPost, Platform, PostStatus, Priority, ScheduleStatus, ScoreBand, Tone, TrendStatus,
    TrendUpsert,
};

use super::MemoryRepository;
use crate::{DbError, Repository};

fn upsert(keyword: &str, score: f64) -> TrendUpsert {
    TrendUpsert {
        keyword: keyword.to_string(),
        category: "football".to_string(),
        viral_score: score,
        momentum_score: 0.0,
        mention_count: 120,
        velocity: 6.0,
        total_engagement: 2_000,
        sentiment_score: 0.1,
        celebrity: false,
        source_metrics: BTreeMap::new(),
        band: ScoreBand::Rising,
        status: TrendStatus::Rising,
        priority: Priority::High,
        seen_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        peak_at: None,
        low_momentum_since: None,
        related_keywords: vec![],
        top_samples: vec![],
    }
}

fn candidate(trend_id: i64, title: &str) -> NewCandidate {
    NewCandidate {
        trend_id,
        title: title.to_string(),
        body: format!("{title} body"),
        content_type: ContentType::News,
        tone: Tone::Neutral,
        hashtags: vec!["#Football".to_string()],
        image_keywords: vec!["stadium".to_string()],
        viral_prediction_score: 70.0,
        engagement_prediction: 5.5,
        best_time_to_post: None,
        priority: Priority::Normal,
        ab_group: None,
        ab_test_id: None,
    }
}

fn post_for(candidate_id: i64, platform: Platform) -> NewPost {
    NewPost {
        candidate_id: Some(candidate_id),
        news_id: None,
        platform,
        title: "title".to_string(),
        caption: "caption".to_string(),
        image_path: None,
        attempt: 1,
        retry_of: None,
    }
}

async fn approved_candidate(repo: &MemoryRepository) -> i64 {
    let trend = repo.upsert_trend(&upsert("Haaland", 70.0)).await.unwrap();
    let inserted = repo
        .insert_candidates(&[candidate(trend.id, "Haaland hat-trick")])
        .await
        .unwrap();
    let id = inserted[0].id;
    repo.set_candidate_status(id, CandidateStatus::Approved)
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn upsert_keeps_detection_time_and_first_peak() {
    let repo = MemoryRepository::new();
    let mut first = upsert("Mbappe", 85.0);
    first.peak_at = Some(first.seen_at);
    let created = repo.upsert_trend(&first).await.unwrap();

    let mut second = upsert("Mbappe", 50.0);
    second.seen_at = first.seen_at + Duration::hours(2);
    second.peak_at = Some(second.seen_at);
    let updated = repo.upsert_trend(&second).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.detected_at, first.seen_at);
    assert_eq!(updated.last_seen_at, second.seen_at);
    assert_eq!(updated.peak_at, first.peak_at);
    assert!((updated.viral_score - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn upsert_reactivates_a_dead_trend() {
    let repo = MemoryRepository::new();
    let trend = repo.upsert_trend(&upsert("VAR", 40.0)).await.unwrap();
    repo.deactivate_trend(trend.id, Utc::now()).await.unwrap();
    assert!(repo.list_active_trends().await.unwrap().is_empty());

    let revived = repo.upsert_trend(&upsert("VAR", 45.0)).await.unwrap();
    assert!(revived.is_active);
    assert!(revived.ended_at.is_none());
}

#[tokio::test]
async fn active_trends_are_ordered_by_score() {
    let repo = MemoryRepository::new();
    repo.upsert_trend(&upsert("low", 20.0)).await.unwrap();
    repo.upsert_trend(&upsert("high", 90.0)).await.unwrap();
    repo.upsert_trend(&upsert("mid", 55.0)).await.unwrap();

    let keywords: Vec<String> = repo
        .list_active_trends()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.keyword)
        .collect();
    assert_eq!(keywords, vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn injected_failure_leaves_no_partial_batch() {
    let repo = MemoryRepository::new();
    let trend = repo.upsert_trend(&upsert("Messi", 75.0)).await.unwrap();
    let batch: Vec<NewCandidate> = (0..5)
        .map(|i| candidate(trend.id, &format!("take {i}")))
        .collect();

    repo.fail_candidate_insert_at(2);
    let err = repo.insert_candidates(&batch).await.unwrap_err();
    assert!(matches!(err, DbError::Unavailable(_)));
    assert_eq!(repo.candidate_count(), 0);

    // The fault fires once; the retry commits the whole batch.
    let inserted = repo.insert_candidates(&batch).await.unwrap();
    assert_eq!(inserted.len(), 5);
    assert!(inserted
        .iter()
        .all(|c| c.status == CandidateStatus::Suggested));
}

#[tokio::test]
async fn candidates_for_unknown_trend_are_rejected() {
    let repo = MemoryRepository::new();
    let err = repo
        .insert_candidates(&[candidate(999, "orphan")])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "trend", id: 999 }));
}

#[tokio::test]
async fn rejecting_twice_is_an_invalid_transition() {
    let repo = MemoryRepository::new();
    let trend = repo.upsert_trend(&upsert("Ronaldo", 66.0)).await.unwrap();
    let id = repo
        .insert_candidates(&[candidate(trend.id, "CR7")])
        .await
        .unwrap()[0]
        .id;

    repo.set_candidate_status(id, CandidateStatus::Rejected)
        .await
        .unwrap();
    let err = repo
        .set_candidate_status(id, CandidateStatus::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { .. }));

    let err = repo
        .edit_candidate(
            id,
            &CandidateEdit {
                title: Some("new".to_string()),
                ..CandidateEdit::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { .. }));
}

#[tokio::test]
async fn edit_only_touches_given_fields() {
    let repo = MemoryRepository::new();
    let trend = repo.upsert_trend(&upsert("Premier League", 61.0)).await.unwrap();
    let original = repo
        .insert_candidates(&[candidate(trend.id, "Title race")])
        .await
        .unwrap()
        .remove(0);

    let edited = repo
        .edit_candidate(
            original.id,
            &CandidateEdit {
                body: Some("Rewritten".to_string()),
                ..CandidateEdit::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.title, original.title);
    assert_eq!(edited.body, "Rewritten");
    assert_eq!(edited.hashtags, original.hashtags);
}

#[tokio::test]
async fn schedule_then_post_publishes_the_candidate() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let post = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    let at = Utc::now() + Duration::minutes(5);

    let schedule = repo.schedule_post(post.id, at).await.unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Pending);
    assert_eq!(schedule.retry_count, 0);
    assert_eq!(
        repo.get_candidate(candidate_id).await.unwrap().status,
        CandidateStatus::Scheduled
    );

    let posted = repo
        .mark_post_posted(post.id, at, "fb_123")
        .await
        .unwrap();
    assert_eq!(posted.status, PostStatus::Posted);
    assert_eq!(posted.external_post_id.as_deref(), Some("fb_123"));

    let candidate = repo.get_candidate(candidate_id).await.unwrap();
    assert_eq!(candidate.status, CandidateStatus::Published);
    assert_eq!(candidate.published_at, Some(at));

    let schedules = repo.list_schedules_for_post(post.id).await.unwrap();
    assert_eq!(schedules[0].status, ScheduleStatus::Published);
}

#[tokio::test]
async fn second_pending_schedule_on_same_platform_conflicts() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let at = Utc::now();

    let first = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    repo.schedule_post(first.id, at).await.unwrap();

    let second = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    let err = repo.schedule_post(second.id, at).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert_eq!(repo.get_post(second.id).await.unwrap().status, PostStatus::Draft);

    let other = repo
        .create_post(&post_for(candidate_id, Platform::Twitter))
        .await
        .unwrap();
    repo.schedule_post(other.id, at).await.unwrap();
}

#[tokio::test]
async fn refused_create_and_schedule_leaves_no_post() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let at = Utc::now();

    let (post, schedule) = repo
        .create_scheduled_post(&post_for(candidate_id, Platform::Facebook), at)
        .await
        .unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.scheduled_time, Some(at));
    assert_eq!(schedule.post_id, post.id);
    assert_eq!(
        repo.get_candidate(candidate_id).await.unwrap().status,
        CandidateStatus::Scheduled
    );

    let err = repo
        .create_scheduled_post(&post_for(candidate_id, Platform::Facebook), at)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert_eq!(repo.all_posts().len(), 1);
}

#[tokio::test]
async fn unschedule_releases_the_candidate() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let post = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    repo.schedule_post(post.id, Utc::now()).await.unwrap();

    let draft = repo.unschedule_post(post.id).await.unwrap();
    assert_eq!(draft.status, PostStatus::Draft);
    assert!(draft.scheduled_time.is_none());
    assert_eq!(
        repo.get_candidate(candidate_id).await.unwrap().status,
        CandidateStatus::Approved
    );
    let schedules = repo.list_schedules_for_post(post.id).await.unwrap();
    assert_eq!(schedules[0].status, ScheduleStatus::Cancelled);

    let err = repo.unschedule_post(post.id).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { entity: "post", .. }));
}

#[tokio::test]
async fn failure_keeps_error_verbatim_and_releases_candidate() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let post = repo
        .create_post(&post_for(candidate_id, Platform::Twitter))
        .await
        .unwrap();
    repo.schedule_post(post.id, Utc::now()).await.unwrap();

    let failed = repo
        .mark_post_failed(post.id, "HTTP 403: duplicate content")
        .await
        .unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("HTTP 403: duplicate content")
    );
    assert_eq!(
        repo.get_candidate(candidate_id).await.unwrap().status,
        CandidateStatus::Approved
    );

    let retry = repo.create_post(&NewPost::retry_of(&failed)).await.unwrap();
    assert_eq!(retry.attempt, 2);
    assert_eq!(retry.retry_of, Some(failed.id));
    let schedule = repo.schedule_post(retry.id, Utc::now()).await.unwrap();
    assert_eq!(schedule.retry_count, 1);
}

#[tokio::test]
async fn scheduling_a_suggested_candidate_is_refused() {
    let repo = MemoryRepository::new();
    let trend = repo.upsert_trend(&upsert("Transfer deadline", 62.0)).await.unwrap();
    let id = repo
        .insert_candidates(&[candidate(trend.id, "Deadline day")])
        .await
        .unwrap()[0]
        .id;
    let post = repo
        .create_post(&post_for(id, Platform::Facebook))
        .await
        .unwrap();

    let err = repo.schedule_post(post.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { entity: "candidate", .. }));
    assert_eq!(repo.get_post(post.id).await.unwrap().status, PostStatus::Draft);
}

#[tokio::test]
async fn due_posts_fall_inside_the_window() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let now = Utc::now();

    let inside = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    repo.schedule_post(inside.id, now + Duration::minutes(4))
        .await
        .unwrap();
    let outside = repo
        .create_post(&post_for(candidate_id, Platform::Twitter))
        .await
        .unwrap();
    repo.schedule_post(outside.id, now + Duration::hours(3))
        .await
        .unwrap();

    let due = repo
        .list_due_posts(now - Duration::minutes(10), now + Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, inside.id);
}

#[tokio::test]
async fn deleting_a_trend_cascades_to_candidates() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let post = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    let trend_id = repo.get_candidate(candidate_id).await.unwrap().trend_id;

    repo.delete_trend(trend_id).await.unwrap();

    assert_eq!(repo.candidate_count(), 0);
    assert!(repo.get_post(post.id).await.unwrap().candidate_id.is_none());
    assert!(matches!(
        repo.delete_trend(trend_id).await.unwrap_err(),
        DbError::NotFound { entity: "trend", .. }
    ));
}

#[tokio::test]
async fn metrics_flow_to_post_and_candidate() {
    let repo = MemoryRepository::new();
    let candidate_id = approved_candidate(&repo).await;
    let post = repo
        .create_post(&post_for(candidate_id, Platform::Facebook))
        .await
        .unwrap();
    let metrics = ContentMetrics::from_counts(1_000, 40, 5, 5);

    repo.record_post_metrics(post.id, &metrics).await.unwrap();

    assert_eq!(repo.get_post(post.id).await.unwrap().metrics, metrics);
    assert_eq!(
        repo.get_candidate(candidate_id).await.unwrap().metrics,
        metrics
    );
    assert!(matches!(
        repo.record_post_metrics(404, &metrics).await.unwrap_err(),
        DbError::NotFound { entity: "post", id: 404 }
    ));
}

#[tokio::test]
async fn content_stats_count_by_status_and_type() {
    let repo = MemoryRepository::new();
    let trend = repo.upsert_trend(&upsert("Champions League", 80.0)).await.unwrap();
    let mut meme = candidate(trend.id, "meme");
    meme.content_type = ContentType::Meme;
    meme.viral_prediction_score = 50.0;
    let inserted = repo
        .insert_candidates(&[candidate(trend.id, "news"), meme])
        .await
        .unwrap();
    repo.set_candidate_status(inserted[0].id, CandidateStatus::Approved)
        .await
        .unwrap();

    let stats = repo.content_stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_status.get("approved"), Some(&1));
    assert_eq!(stats.by_status.get("suggested"), Some(&1));
    assert_eq!(stats.by_type.get("meme"), Some(&1));
    assert!((stats.avg_viral_prediction - 60.0).abs() < 1e-9);
}

#[tokio::test]
async fn news_dedupes_by_url_and_serves_freshest_first() {
    let repo = MemoryRepository::new();
    let older = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    let newer = older + Duration::hours(3);
    let item = |url: &str, published_at| NewNewsItem {
        title: format!("story {url}"),
        description: String::new(),
        url: url.to_string(),
        source: "BBC Sport".to_string(),
        image_url: None,
        published_at,
    };

    let inserted = repo
        .insert_news_items(&[
            item("https://a", Some(older)),
            item("https://b", Some(newer)),
            item("https://c", None),
            item("https://a", Some(newer)),
        ])
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let freshest = repo.freshest_unused_news().await.unwrap().unwrap();
    assert_eq!(freshest.url, "https://b");
    repo.mark_news_used(freshest.id).await.unwrap();
    assert_eq!(
        repo.freshest_unused_news().await.unwrap().unwrap().url,
        "https://a"
    );
}

#[tokio::test]
async fn unavailable_store_fails_every_call() {
    let repo = MemoryRepository::new();
    repo.set_unavailable(true);
    assert!(matches!(
        repo.health_check().await.unwrap_err(),
        DbError::Unavailable(_)
    ));
    assert!(repo.list_active_trends().await.is_err());

    repo.set_unavailable(false);
    repo.health_check().await.unwrap();
}
