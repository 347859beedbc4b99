use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trendcast_core::{
    CandidateEdit, CandidateStatus, ContentCandidate, ContentMetrics, ContentStats, NewCandidate,
    NewNewsItem, NewPost, NewsItem, Post, PublishSchedule, Trend, TrendUpsert,
};

use crate::DbError;

/// Storage operations used by the pipeline.
///
/// Every method that touches more than one row runs as a single transaction:
/// a failure leaves the store exactly as it was before the call.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- trends -----------------------------------------------------------

    /// Insert or update a trend keyed by its keyword.
    async fn upsert_trend(&self, trend: &TrendUpsert) -> Result<Trend, DbError>;

    async fn get_trend(&self, id: i64) -> Result<Trend, DbError>;

    async fn find_trend_by_keyword(&self, keyword: &str) -> Result<Option<Trend>, DbError>;

    /// Active trends, highest viral score first.
    async fn list_active_trends(&self) -> Result<Vec<Trend>, DbError>;

    /// Mark a trend dead and inactive, stamping `ended_at`.
    async fn deactivate_trend(&self, id: i64, ended_at: DateTime<Utc>) -> Result<(), DbError>;

    /// Delete a trend together with its candidates.
    async fn delete_trend(&self, id: i64) -> Result<(), DbError>;

    // --- candidates -------------------------------------------------------

    /// Insert a generated batch all-or-nothing, returning rows in input order.
    async fn insert_candidates(
        &self,
        batch: &[NewCandidate],
    ) -> Result<Vec<ContentCandidate>, DbError>;

    async fn get_candidate(&self, id: i64) -> Result<ContentCandidate, DbError>;

    /// Candidates of a trend, highest predicted score first.
    async fn list_candidates(
        &self,
        trend_id: i64,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<ContentCandidate>, DbError>;

    /// Move a candidate to `next`, enforcing the candidate status machine.
    async fn set_candidate_status(
        &self,
        id: i64,
        next: CandidateStatus,
    ) -> Result<ContentCandidate, DbError>;

    /// Apply manual edits; rejected once the candidate is published or rejected.
    async fn edit_candidate(
        &self,
        id: i64,
        edit: &CandidateEdit,
    ) -> Result<ContentCandidate, DbError>;

    async fn content_stats(&self) -> Result<ContentStats, DbError>;

    // --- posts ------------------------------------------------------------

    async fn create_post(&self, post: &NewPost) -> Result<Post, DbError>;

    /// Create a post and schedule it at `at` in one transaction.
    ///
    /// Validates like [`Repository::schedule_post`]; on any failure no post
    /// row is left behind.
    async fn create_scheduled_post(
        &self,
        post: &NewPost,
        at: DateTime<Utc>,
    ) -> Result<(Post, PublishSchedule), DbError>;

    async fn get_post(&self, id: i64) -> Result<Post, DbError>;

    /// Move a draft post to `scheduled` and open a pending schedule for it.
    ///
    /// When the post belongs to a candidate, an approved candidate becomes
    /// scheduled. Fails with [`DbError::Conflict`] if the candidate already
    /// has a pending schedule on the same platform.
    async fn schedule_post(
        &self,
        post_id: i64,
        at: DateTime<Utc>,
    ) -> Result<PublishSchedule, DbError>;

    /// Return a scheduled post to `draft`, clearing `scheduled_time` and
    /// cancelling its pending schedule.
    async fn unschedule_post(&self, post_id: i64) -> Result<Post, DbError>;

    /// Record a successful send: post `posted`, schedule `published`,
    /// candidate `published`.
    async fn mark_post_posted(
        &self,
        post_id: i64,
        posted_at: DateTime<Utc>,
        external_post_id: &str,
    ) -> Result<Post, DbError>;

    /// Record a failed send with the error message as given.
    async fn mark_post_failed(&self, post_id: i64, error: &str) -> Result<Post, DbError>;

    /// Scheduled posts whose `scheduled_time` lies within `[from, to]`.
    async fn list_due_posts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Post>, DbError>;

    /// Posted posts with an external id, posted at or after `since`.
    async fn list_posted_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, DbError>;

    async fn list_schedules_for_post(&self, post_id: i64) -> Result<Vec<PublishSchedule>, DbError>;

    /// Store fetched metrics on the post and, if any, its candidate.
    async fn record_post_metrics(
        &self,
        post_id: i64,
        metrics: &ContentMetrics,
    ) -> Result<(), DbError>;

    // --- news -------------------------------------------------------------

    /// Insert news items, skipping urls already stored. Returns the number inserted.
    async fn insert_news_items(&self, items: &[NewNewsItem]) -> Result<usize, DbError>;

    /// The most recently published news item not yet used for a post.
    async fn freshest_unused_news(&self) -> Result<Option<NewsItem>, DbError>;

    async fn mark_news_used(&self, id: i64) -> Result<(), DbError>;

    // --- health -----------------------------------------------------------

    async fn health_check(&self) -> Result<(), DbError>;
}
