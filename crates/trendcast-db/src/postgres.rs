use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trendcast_core::{
    CandidateEdit, CandidateStatus, ContentCandidate, ContentMetrics, ContentStats, NewCandidate,
    NewNewsItem, NewPost, NewsItem, Post, PublishSchedule, Trend, TrendUpsert,
};

use crate::{candidates, news, posts, trends, DbError, Repository};

/// [`Repository`] backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn upsert_trend(&self, trend: &TrendUpsert) -> Result<Trend, DbError> {
        trends::upsert_trend(&self.pool, trend).await
    }

    async fn get_trend(&self, id: i64) -> Result<Trend, DbError> {
        trends::get_trend(&self.pool, id).await
    }

    async fn find_trend_by_keyword(&self, keyword: &str) -> Result<Option<Trend>, DbError> {
        trends::find_trend_by_keyword(&self.pool, keyword).await
    }

    async fn list_active_trends(&self) -> Result<Vec<Trend>, DbError> {
        trends::list_active_trends(&self.pool).await
    }

    async fn deactivate_trend(&self, id: i64, ended_at: DateTime<Utc>) -> Result<(), DbError> {
        trends::deactivate_trend(&self.pool, id, ended_at).await
    }

    async fn delete_trend(&self, id: i64) -> Result<(), DbError> {
        trends::delete_trend(&self.pool, id).await
    }

    async fn insert_candidates(
        &self,
        batch: &[NewCandidate],
    ) -> Result<Vec<ContentCandidate>, DbError> {
        candidates::insert_candidates(&self.pool, batch).await
    }

    async fn get_candidate(&self, id: i64) -> Result<ContentCandidate, DbError> {
        candidates::get_candidate(&self.pool, id).await
    }

    async fn list_candidates(
        &self,
        trend_id: i64,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<ContentCandidate>, DbError> {
        candidates::list_candidates(&self.pool, trend_id, status).await
    }

    async fn set_candidate_status(
        &self,
        id: i64,
        next: CandidateStatus,
    ) -> Result<ContentCandidate, DbError> {
        candidates::set_candidate_status(&self.pool, id, next).await
    }

    async fn edit_candidate(
        &self,
        id: i64,
        edit: &CandidateEdit,
    ) -> Result<ContentCandidate, DbError> {
        candidates::edit_candidate(&self.pool, id, edit).await
    }

    async fn content_stats(&self) -> Result<ContentStats, DbError> {
        candidates::content_stats(&self.pool).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, DbError> {
        posts::create_post(&self.pool, post).await
    }

    async fn create_scheduled_post(
        &self,
        post: &NewPost,
        at: DateTime<Utc>,
    ) -> Result<(Post, PublishSchedule), DbError> {
        posts::create_scheduled_post(&self.pool, post, at).await
    }

    async fn get_post(&self, id: i64) -> Result<Post, DbError> {
        posts::get_post(&self.pool, id).await
    }

    async fn schedule_post(
        &self,
        post_id: i64,
        at: DateTime<Utc>,
    ) -> Result<PublishSchedule, DbError> {
        posts::schedule_post(&self.pool, post_id, at).await
    }

    async fn unschedule_post(&self, post_id: i64) -> Result<Post, DbError> {
        posts::unschedule_post(&self.pool, post_id).await
    }

    async fn mark_post_posted(
        &self,
        post_id: i64,
        posted_at: DateTime<Utc>,
        external_post_id: &str,
    ) -> Result<Post, DbError> {
        posts::mark_post_posted(&self.pool, post_id, posted_at, external_post_id).await
    }

    async fn mark_post_failed(&self, post_id: i64, error: &str) -> Result<Post, DbError> {
        posts::mark_post_failed(&self.pool, post_id, error).await
    }

    async fn list_due_posts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Post>, DbError> {
        posts::list_due_posts(&self.pool, from, to).await
    }

    async fn list_posted_since(&self, since: DateTime<Utc>) -> Result<Vec<Post>, DbError> {
        posts::list_posted_since(&self.pool, since).await
    }

    async fn list_schedules_for_post(&self, post_id: i64) -> Result<Vec<PublishSchedule>, DbError> {
        posts::list_schedules_for_post(&self.pool, post_id).await
    }

    async fn record_post_metrics(
        &self,
        post_id: i64,
        metrics: &ContentMetrics,
    ) -> Result<(), DbError> {
        posts::record_post_metrics(&self.pool, post_id, metrics).await
    }

    async fn insert_news_items(&self, items: &[NewNewsItem]) -> Result<usize, DbError> {
        news::insert_news_items(&self.pool, items).await
    }

    async fn freshest_unused_news(&self) -> Result<Option<NewsItem>, DbError> {
        news::freshest_unused_news(&self.pool).await
    }

    async fn mark_news_used(&self, id: i64) -> Result<(), DbError> {
        news::mark_news_used(&self.pool, id).await
    }

    async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
