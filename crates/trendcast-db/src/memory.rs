//! In-process [`Repository`] used for dry runs and tests.
//!
//! Mirrors the Postgres semantics: multi-row operations validate everything
//! before mutating, so a failed call leaves the state untouched. Faults can
//! be injected to exercise rollback paths.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trendcast_core::{
    CandidateEdit, CandidateStatus, ContentCandidate, ContentMetrics, ContentStats, NewCandidate,
    NewNewsItem, NewPost, NewsItem, Platform, Post, PostStatus, PublishSchedule, ScheduleStatus,
    Trend, TrendStatus, TrendUpsert,
};

use crate::{DbError, Repository};

#[derive(Debug, Default)]
struct Faults {
    /// Fail `insert_candidates` when it reaches this index of the batch.
    candidate_insert_at: Option<usize>,
    /// Fail every call with [`DbError::Unavailable`].
    unavailable: bool,
    /// Fail `mark_news_used` with [`DbError::Unavailable`].
    mark_news_used: bool,
}

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    trends: BTreeMap<i64, Trend>,
    candidates: BTreeMap<i64, ContentCandidate>,
    posts: BTreeMap<i64, Post>,
    schedules: BTreeMap<i64, PublishSchedule>,
    news: BTreeMap<i64, NewsItem>,
    faults: Faults,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.faults.unavailable {
            return Err(DbError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn post(&self, id: i64) -> Result<&Post, DbError> {
        self.posts
            .get(&id)
            .ok_or(DbError::NotFound { entity: "post", id })
    }

    fn candidate(&self, id: i64) -> Result<&ContentCandidate, DbError> {
        self.candidates.get(&id).ok_or(DbError::NotFound {
            entity: "candidate",
            id,
        })
    }

    fn has_pending_schedule(&self, candidate_id: i64) -> bool {
        self.schedules.values().any(|s| {
            s.candidate_id == Some(candidate_id) && s.status == ScheduleStatus::Pending
        })
    }

    fn close_pending_schedules(
        &mut self,
        post_id: i64,
        status: ScheduleStatus,
        error: Option<&str>,
        published_at: Option<DateTime<Utc>>,
    ) {
        for schedule in self.schedules.values_mut() {
            if schedule.post_id == post_id && schedule.status == ScheduleStatus::Pending {
                schedule.status = status;
                if let Some(error) = error {
                    schedule.error_message = Some(error.to_string());
                }
                if published_at.is_some() {
                    schedule.published_at = published_at;
                }
            }
        }
    }

    fn release_candidate(&mut self, candidate_id: i64) {
        let pending = self.has_pending_schedule(candidate_id);
        if let Some(candidate) = self.candidates.get_mut(&candidate_id) {
            if candidate.status == CandidateStatus::Scheduled && !pending {
                candidate.status = CandidateStatus::Approved;
                candidate.updated_at = Utc::now();
            }
        }
    }

    fn insert_post(&mut self, new: &NewPost) -> Post {
        let now = Utc::now();
        let post = Post {
            id: self.next_id(),
            candidate_id: new.candidate_id,
            news_id: new.news_id,
            platform: new.platform,
            title: new.title.clone(),
            caption: new.caption.clone(),
            image_path: new.image_path.clone(),
            status: PostStatus::Draft,
            scheduled_time: None,
            posted_time: None,
            external_post_id: None,
            error_message: None,
            attempt: new.attempt,
            retry_of: new.retry_of,
            metrics: ContentMetrics::default(),
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(post.id, post.clone());
        post
    }

    /// Checks that a post for `candidate_id` may be scheduled on `platform`.
    /// Returns whether the candidate moves from approved to scheduled.
    fn check_schedulable(
        &self,
        candidate_id: Option<i64>,
        platform: Platform,
    ) -> Result<bool, DbError> {
        let Some(candidate_id) = candidate_id else {
            return Ok(false);
        };
        let promote = match self.candidate(candidate_id)?.status {
            CandidateStatus::Approved => true,
            CandidateStatus::Scheduled | CandidateStatus::Published => false,
            other => {
                return Err(DbError::InvalidTransition {
                    entity: "candidate",
                    id: candidate_id,
                    to: "scheduled".to_string(),
                    expected: format!("approved (is {other})"),
                });
            }
        };
        let busy = self.schedules.values().any(|s| {
            s.candidate_id == Some(candidate_id)
                && s.platform == platform
                && s.status == ScheduleStatus::Pending
        });
        if busy {
            return Err(DbError::Conflict(format!(
                "candidate {candidate_id} already has a pending {platform} schedule"
            )));
        }
        Ok(promote)
    }

    /// Moves a validated draft to `scheduled` and opens its pending schedule.
    fn open_schedule(
        &mut self,
        post: &Post,
        at: DateTime<Utc>,
        promote: bool,
    ) -> PublishSchedule {
        let now = Utc::now();
        if let (true, Some(candidate_id)) = (promote, post.candidate_id) {
            if let Some(candidate) = self.candidates.get_mut(&candidate_id) {
                candidate.status = CandidateStatus::Scheduled;
                candidate.updated_at = now;
            }
        }
        if let Some(stored) = self.posts.get_mut(&post.id) {
            stored.status = PostStatus::Scheduled;
            stored.scheduled_time = Some(at);
            stored.updated_at = now;
        }

        let schedule = PublishSchedule {
            id: self.next_id(),
            candidate_id: post.candidate_id,
            post_id: post.id,
            platform: post.platform,
            scheduled_time: at,
            status: ScheduleStatus::Pending,
            error_message: None,
            retry_count: post.attempt - 1,
            published_at: None,
            created_at: now,
        };
        self.schedules.insert(schedule.id, schedule.clone());
        schedule
    }
}

fn post_transition_error(post: &Post, to: &str, expected: &str) -> DbError {
    DbError::InvalidTransition {
        entity: "post",
        id: post.id,
        to: to.to_string(),
        expected: format!("{expected} (is {})", post.status),
    }
}

/// [`Repository`] holding all rows in memory behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `insert_candidates` call fail once it reaches `index`.
    pub fn fail_candidate_insert_at(&self, index: usize) {
        self.state().faults.candidate_insert_at = Some(index);
    }

    /// Toggle a simulated outage for every operation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().faults.unavailable = unavailable;
    }

    /// Toggle a simulated failure of `mark_news_used` only.
    pub fn fail_mark_news_used(&self, fail: bool) {
        self.state().faults.mark_news_used = fail;
    }

    /// Number of stored candidates, across all trends.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.state().candidates.len()
    }

    /// Snapshot of every stored post, in id order.
    #[must_use]
    pub fn all_posts(&self) -> Vec<Post> {
        self.state().posts.values().cloned().collect()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_trend(&self, upsert: &TrendUpsert) -> Result<Trend, DbError> {
        let mut state = self.state();
        state.check_available()?;

        let existing = state
            .trends
            .values()
            .find(|t| t.keyword == upsert.keyword)
            .map(|t| (t.id, t.detected_at, t.peak_at));

        let (id, detected_at, peak_at) = match existing {
            Some((id, detected_at, peak_at)) => (id, detected_at, peak_at.or(upsert.peak_at)),
            None => (state.next_id(), upsert.seen_at, upsert.peak_at),
        };

        let trend = Trend {
            id,
            keyword: upsert.keyword.clone(),
            category: upsert.category.clone(),
            viral_score: upsert.viral_score,
            momentum_score: upsert.momentum_score,
            mention_count: upsert.mention_count,
            velocity: upsert.velocity,
            total_engagement: upsert.total_engagement,
            sentiment_score: upsert.sentiment_score,
            celebrity: upsert.celebrity,
            source_metrics: upsert.source_metrics.clone(),
            band: upsert.band,
            status: upsert.status,
            priority: upsert.priority,
            is_active: true,
            detected_at,
            last_seen_at: upsert.seen_at,
            peak_at,
            ended_at: None,
            low_momentum_since: upsert.low_momentum_since,
            related_keywords: upsert.related_keywords.clone(),
            top_samples: upsert.top_samples.clone(),
        };
        state.trends.insert(id, trend.clone());
        Ok(trend)
    }

    async fn get_trend(&self, id: i64) -> Result<Trend, DbError> {
        let state = self.state();
        state.check_available()?;
        state
            .trends
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound { entity: "trend", id })
    }

    async fn find_trend_by_keyword(&self, keyword: &str) -> Result<Option<Trend>, DbError> {
        let state = self.state();
        state.check_available()?;
        Ok(state.trends.values().find(|t| t.keyword == keyword).cloned())
    }

    async fn list_active_trends(&self) -> Result<Vec<Trend>, DbError> {
        let state = self.state();
        state.check_available()?;
        let mut trends: Vec<Trend> = state
            .trends
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        trends.sort_by(|a, b| {
            b.viral_score
                .total_cmp(&a.viral_score)
                .then(a.detected_at.cmp(&b.detected_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(trends)
    }

    async fn deactivate_trend(&self, id: i64, ended_at: DateTime<Utc>) -> Result<(), DbError> {
        let mut state = self.state();
        state.check_available()?;
        let trend = state
            .trends
            .get_mut(&id)
            .ok_or(DbError::NotFound { entity: "trend", id })?;
        trend.is_active = false;
        trend.status = TrendStatus::Dead;
        trend.ended_at.get_or_insert(ended_at);
        Ok(())
    }

    async fn delete_trend(&self, id: i64) -> Result<(), DbError> {
        let mut state = self.state();
        state.check_available()?;
        if state.trends.remove(&id).is_none() {
            return Err(DbError::NotFound { entity: "trend", id });
        }

        let removed: Vec<i64> = state
            .candidates
            .values()
            .filter(|c| c.trend_id == id)
            .map(|c| c.id)
            .collect();
        for candidate_id in &removed {
            state.candidates.remove(candidate_id);
        }
        state
            .schedules
            .retain(|_, s| s.candidate_id.is_none_or(|c| !removed.contains(&c)));
        for post in state.posts.values_mut() {
            if post.candidate_id.is_some_and(|c| removed.contains(&c)) {
                post.candidate_id = None;
            }
        }
        Ok(())
    }

    async fn insert_candidates(
        &self,
        batch: &[NewCandidate],
    ) -> Result<Vec<ContentCandidate>, DbError> {
        let mut state = self.state();
        state.check_available()?;

        let fail_at = state.faults.candidate_insert_at.take();
        let now = Utc::now();
        let mut staged = Vec::with_capacity(batch.len());

        for (index, new) in batch.iter().enumerate() {
            if fail_at == Some(index) {
                return Err(DbError::Unavailable(format!(
                    "injected failure inserting candidate {}",
                    index + 1
                )));
            }
            if !state.trends.contains_key(&new.trend_id) {
                return Err(DbError::NotFound {
                    entity: "trend",
                    id: new.trend_id,
                });
            }
            staged.push(ContentCandidate {
                id: 0,
                trend_id: new.trend_id,
                title: new.title.clone(),
                body: new.body.clone(),
                content_type: new.content_type,
                tone: new.tone,
                hashtags: new.hashtags.clone(),
                image_keywords: new.image_keywords.clone(),
                viral_prediction_score: new.viral_prediction_score,
                engagement_prediction: new.engagement_prediction,
                best_time_to_post: new.best_time_to_post,
                priority: new.priority,
                status: CandidateStatus::Suggested,
                ab_group: new.ab_group.clone(),
                ab_test_id: new.ab_test_id.clone(),
                metrics: ContentMetrics::default(),
                created_at: now,
                updated_at: now,
                published_at: None,
            });
        }

        for candidate in &mut staged {
            candidate.id = state.next_id();
            state.candidates.insert(candidate.id, candidate.clone());
        }
        Ok(staged)
    }

    async fn get_candidate(&self, id: i64) -> Result<ContentCandidate, DbError> {
        let state = self.state();
        state.check_available()?;
        state.candidate(id).cloned()
    }

    async fn list_candidates(
        &self,
        trend_id: i64,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<ContentCandidate>, DbError> {
        let state = self.state();
        state.check_available()?;
        let mut rows: Vec<ContentCandidate> = state
            .candidates
            .values()
            .filter(|c| c.trend_id == trend_id && status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.viral_prediction_score
                .total_cmp(&a.viral_prediction_score)
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn set_candidate_status(
        &self,
        id: i64,
        next: CandidateStatus,
    ) -> Result<ContentCandidate, DbError> {
        let mut state = self.state();
        state.check_available()?;
        let candidate = state.candidates.get_mut(&id).ok_or(DbError::NotFound {
            entity: "candidate",
            id,
        })?;

        if !candidate.status.can_transition_to(next) {
            let expected = CandidateStatus::sources_for(next)
                .into_iter()
                .map(CandidateStatus::as_str)
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(DbError::InvalidTransition {
                entity: "candidate",
                id,
                to: next.as_str().to_string(),
                expected,
            });
        }

        let now = Utc::now();
        candidate.status = next;
        candidate.updated_at = now;
        if next == CandidateStatus::Published {
            candidate.published_at = Some(now);
        }
        Ok(candidate.clone())
    }

    async fn edit_candidate(
        &self,
        id: i64,
        edit: &CandidateEdit,
    ) -> Result<ContentCandidate, DbError> {
        let mut state = self.state();
        state.check_available()?;
        let candidate = state.candidates.get_mut(&id).ok_or(DbError::NotFound {
            entity: "candidate",
            id,
        })?;

        if candidate.status.is_terminal() {
            return Err(DbError::InvalidTransition {
                entity: "candidate",
                id,
                to: "edited".to_string(),
                expected: format!("non-terminal (is {})", candidate.status),
            });
        }

        if let Some(title) = &edit.title {
            candidate.title.clone_from(title);
        }
        if let Some(body) = &edit.body {
            candidate.body.clone_from(body);
        }
        if let Some(hashtags) = &edit.hashtags {
            candidate.hashtags.clone_from(hashtags);
        }
        if let Some(at) = edit.best_time_to_post {
            candidate.best_time_to_post = Some(at);
        }
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    #[allow(clippy::cast_precision_loss)]
    async fn content_stats(&self) -> Result<ContentStats, DbError> {
        let state = self.state();
        state.check_available()?;

        let mut stats = ContentStats::default();
        let mut viral_sum = 0.0;
        let mut published_rates = Vec::new();
        for candidate in state.candidates.values() {
            stats.total += 1;
            *stats
                .by_status
                .entry(candidate.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_type
                .entry(candidate.content_type.as_str().to_string())
                .or_default() += 1;
            viral_sum += candidate.viral_prediction_score;
            if candidate.status == CandidateStatus::Published {
                published_rates.push(candidate.metrics.engagement_rate);
            }
        }
        if stats.total > 0 {
            stats.avg_viral_prediction = viral_sum / stats.total as f64;
        }
        if !published_rates.is_empty() {
            stats.published_avg_engagement_rate =
                published_rates.iter().sum::<f64>() / published_rates.len() as f64;
        }
        Ok(stats)
    }

    async fn create_post(&self, new: &NewPost) -> Result<Post, DbError> {
        let mut state = self.state();
        state.check_available()?;
        if let Some(candidate_id) = new.candidate_id {
            state.candidate(candidate_id)?;
        }
        Ok(state.insert_post(new))
    }

    async fn create_scheduled_post(
        &self,
        new: &NewPost,
        at: DateTime<Utc>,
    ) -> Result<(Post, PublishSchedule), DbError> {
        let mut state = self.state();
        state.check_available()?;
        let promote = state.check_schedulable(new.candidate_id, new.platform)?;

        let post = state.insert_post(new);
        let schedule = state.open_schedule(&post, at, promote);
        let post = state.post(post.id)?.clone();
        Ok((post, schedule))
    }

    async fn get_post(&self, id: i64) -> Result<Post, DbError> {
        let state = self.state();
        state.check_available()?;
        state.post(id).cloned()
    }

    async fn schedule_post(
        &self,
        post_id: i64,
        at: DateTime<Utc>,
    ) -> Result<PublishSchedule, DbError> {
        let mut state = self.state();
        state.check_available()?;

        let post = state.post(post_id)?.clone();
        if post.status != PostStatus::Draft {
            return Err(post_transition_error(&post, "scheduled", "draft"));
        }
        let promote = state.check_schedulable(post.candidate_id, post.platform)?;
        Ok(state.open_schedule(&post, at, promote))
    }

    async fn unschedule_post(&self, post_id: i64) -> Result<Post, DbError> {
        let mut state = self.state();
        state.check_available()?;

        let post = state.post(post_id)?.clone();
        if post.status != PostStatus::Scheduled {
            return Err(post_transition_error(&post, "draft", "scheduled"));
        }

        state.close_pending_schedules(post_id, ScheduleStatus::Cancelled, None, None);
        if let Some(candidate_id) = post.candidate_id {
            state.release_candidate(candidate_id);
        }

        let stored = state
            .posts
            .get_mut(&post_id)
            .ok_or(DbError::NotFound { entity: "post", id: post_id })?;
        stored.status = PostStatus::Draft;
        stored.scheduled_time = None;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn mark_post_posted(
        &self,
        post_id: i64,
        posted_at: DateTime<Utc>,
        external_post_id: &str,
    ) -> Result<Post, DbError> {
        let mut state = self.state();
        state.check_available()?;

        let post = state.post(post_id)?.clone();
        if post.status != PostStatus::Scheduled {
            return Err(post_transition_error(&post, "posted", "scheduled"));
        }

        state.close_pending_schedules(post_id, ScheduleStatus::Published, None, Some(posted_at));
        if let Some(candidate_id) = post.candidate_id {
            if let Some(candidate) = state.candidates.get_mut(&candidate_id) {
                if candidate.status == CandidateStatus::Scheduled {
                    candidate.status = CandidateStatus::Published;
                    candidate.published_at = Some(posted_at);
                    candidate.updated_at = Utc::now();
                }
            }
        }

        let stored = state
            .posts
            .get_mut(&post_id)
            .ok_or(DbError::NotFound { entity: "post", id: post_id })?;
        stored.status = PostStatus::Posted;
        stored.posted_time = Some(posted_at);
        stored.external_post_id = Some(external_post_id.to_string());
        stored.error_message = None;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn mark_post_failed(&self, post_id: i64, error: &str) -> Result<Post, DbError> {
        let mut state = self.state();
        state.check_available()?;

        let post = state.post(post_id)?.clone();
        if post.status != PostStatus::Scheduled {
            return Err(post_transition_error(&post, "failed", "scheduled"));
        }

        state.close_pending_schedules(post_id, ScheduleStatus::Failed, Some(error), None);
        if let Some(candidate_id) = post.candidate_id {
            state.release_candidate(candidate_id);
        }

        let stored = state
            .posts
            .get_mut(&post_id)
            .ok_or(DbError::NotFound { entity: "post", id: post_id })?;
        stored.status = PostStatus::Failed;
        stored.error_message = Some(error.to_string());
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_due_posts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Post>, DbError> {
        let state = self.state();
        state.check_available()?;
        let mut due: Vec<Post> = state
            .posts
            .values()
            .filter(|p| {
                p.status == PostStatus::Scheduled
                    && p.scheduled_time.is_some_and(|t| t >= from && t <= to)
            })
            .cloned()
            .collect();
        due.sort_by_key(|p| (p.scheduled_time, p.id));
        Ok(due)
    }

    async fn list_posted_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, DbError> {
        let state = self.state();
        state.check_available()?;
        let mut posted: Vec<Post> = state
            .posts
            .values()
            .filter(|p| {
                p.status == PostStatus::Posted
                    && p.external_post_id.is_some()
                    && p.posted_time.is_some_and(|t| t >= since)
            })
            .cloned()
            .collect();
        posted.sort_by(|a, b| b.posted_time.cmp(&a.posted_time).then(b.id.cmp(&a.id)));
        Ok(posted)
    }

    async fn list_schedules_for_post(&self, post_id: i64) -> Result<Vec<PublishSchedule>, DbError> {
        let state = self.state();
        state.check_available()?;
        Ok(state
            .schedules
            .values()
            .filter(|s| s.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn record_post_metrics(
        &self,
        post_id: i64,
        metrics: &ContentMetrics,
    ) -> Result<(), DbError> {
        let mut state = self.state();
        state.check_available()?;
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or(DbError::NotFound { entity: "post", id: post_id })?;
        post.metrics = *metrics;
        post.updated_at = Utc::now();
        let candidate_id = post.candidate_id;

        if let Some(candidate) = candidate_id.and_then(|id| state.candidates.get_mut(&id)) {
            candidate.metrics = *metrics;
            candidate.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_news_items(&self, items: &[NewNewsItem]) -> Result<usize, DbError> {
        let mut state = self.state();
        state.check_available()?;
        let now = Utc::now();
        let mut inserted = 0;
        for item in items {
            if state.news.values().any(|n| n.url == item.url) {
                continue;
            }
            let id = state.next_id();
            state.news.insert(
                id,
                NewsItem {
                    id,
                    title: item.title.clone(),
                    description: item.description.clone(),
                    url: item.url.clone(),
                    source: item.source.clone(),
                    image_url: item.image_url.clone(),
                    published_at: item.published_at,
                    is_used: false,
                    created_at: now,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn freshest_unused_news(&self) -> Result<Option<NewsItem>, DbError> {
        let state = self.state();
        state.check_available()?;
        // Items without a publish date sort last, matching `NULLS LAST`.
        Ok(state
            .news
            .values()
            .filter(|n| !n.is_used)
            .max_by(|a, b| {
                a.published_at
                    .is_some()
                    .cmp(&b.published_at.is_some())
                    .then(a.published_at.cmp(&b.published_at))
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .cloned())
    }

    async fn mark_news_used(&self, id: i64) -> Result<(), DbError> {
        let mut state = self.state();
        state.check_available()?;
        if state.faults.mark_news_used {
            return Err(DbError::Unavailable("news marking failed".to_string()));
        }
        let item = state.news.get_mut(&id).ok_or(DbError::NotFound {
            entity: "news item",
            id,
        })?;
        item.is_used = true;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DbError> {
        self.state().check_available()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
