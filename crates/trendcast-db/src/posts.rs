//! Database operations for `posts` and `publish_schedules`.
//!
//! Every status change here is a single transaction covering the post, its
//! schedule, and the owning candidate.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use trendcast_core::{ContentMetrics, NewPost, Post, PublishSchedule};

use crate::DbError;

const POST_COLUMNS: &str = "id, candidate_id, news_id, platform, title, caption, image_path, \
     status, scheduled_time, posted_time, external_post_id, error_message, attempt, retry_of, \
     views, likes, shares, comments, engagement_rate, created_at, updated_at";

const SCHEDULE_COLUMNS: &str = "id, candidate_id, post_id, platform, scheduled_time, status, \
     error_message, retry_count, published_at, created_at";

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub candidate_id: Option<i64>,
    pub news_id: Option<i64>,
    pub platform: String,
    pub title: String,
    pub caption: String,
    pub image_path: Option<String>,
    pub status: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub posted_time: Option<DateTime<Utc>>,
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
    pub attempt: i32,
    pub retry_of: Option<i64>,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub engagement_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = DbError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Post {
            id: row.id,
            candidate_id: row.candidate_id,
            news_id: row.news_id,
            platform: row.platform.parse()?,
            title: row.title,
            caption: row.caption,
            image_path: row.image_path,
            status: row.status.parse()?,
            scheduled_time: row.scheduled_time,
            posted_time: row.posted_time,
            external_post_id: row.external_post_id,
            error_message: row.error_message,
            attempt: row.attempt,
            retry_of: row.retry_of,
            metrics: ContentMetrics {
                views: row.views,
                likes: row.likes,
                shares: row.shares,
                comments: row.comments,
                engagement_rate: row.engagement_rate,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `publish_schedules` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublishScheduleRow {
    pub id: i64,
    pub candidate_id: Option<i64>,
    pub post_id: i64,
    pub platform: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: String,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PublishScheduleRow> for PublishSchedule {
    type Error = DbError;

    fn try_from(row: PublishScheduleRow) -> Result<Self, Self::Error> {
        Ok(PublishSchedule {
            id: row.id,
            candidate_id: row.candidate_id,
            post_id: row.post_id,
            platform: row.platform.parse()?,
            scheduled_time: row.scheduled_time,
            status: row.status.parse()?,
            error_message: row.error_message,
            retry_count: row.retry_count,
            published_at: row.published_at,
            created_at: row.created_at,
        })
    }
}

pub(crate) async fn create_post(pool: &PgPool, post: &NewPost) -> Result<Post, DbError> {
    let mut conn = pool.acquire().await?;
    insert_post(&mut conn, post).await
}

async fn insert_post(conn: &mut PgConnection, post: &NewPost) -> Result<Post, DbError> {
    let sql = format!(
        "INSERT INTO posts (candidate_id, news_id, platform, title, caption, image_path, \
             attempt, retry_of) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {POST_COLUMNS}"
    );
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(post.candidate_id)
        .bind(post.news_id)
        .bind(post.platform.as_str())
        .bind(&post.title)
        .bind(&post.caption)
        .bind(post.image_path.as_deref())
        .bind(post.attempt)
        .bind(post.retry_of)
        .fetch_one(conn)
        .await?
        .try_into()
}

/// Inserts the post and schedules it inside one transaction; a refused
/// schedule rolls the insert back.
pub(crate) async fn create_scheduled_post(
    pool: &PgPool,
    new: &NewPost,
    at: DateTime<Utc>,
) -> Result<(Post, PublishSchedule), DbError> {
    let mut tx = pool.begin().await?;
    let post = insert_post(&mut tx, new).await?;
    let schedule = open_schedule(&mut tx, &post, at).await?;
    let post = lock_post(&mut tx, post.id).await?;
    tx.commit().await?;
    Ok((post, schedule))
}

pub(crate) async fn get_post(pool: &PgPool, id: i64) -> Result<Post, DbError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound { entity: "post", id })?
        .try_into()
}

async fn lock_post(conn: &mut PgConnection, id: i64) -> Result<Post, DbError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(DbError::NotFound { entity: "post", id })?
        .try_into()
}

fn post_transition_error(post: &Post, to: &str, expected: &str) -> DbError {
    DbError::InvalidTransition {
        entity: "post",
        id: post.id,
        to: to.to_string(),
        expected: format!("{expected} (is {})", post.status),
    }
}

/// Returns a scheduled candidate to `approved` once it has no pending
/// schedules left on any platform.
async fn release_candidate(conn: &mut PgConnection, candidate_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE content_candidates SET status = 'approved', updated_at = NOW() \
         WHERE id = $1 AND status = 'scheduled' \
           AND NOT EXISTS ( \
               SELECT 1 FROM publish_schedules \
               WHERE candidate_id = $1 AND status = 'pending')",
    )
    .bind(candidate_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn schedule_post(
    pool: &PgPool,
    post_id: i64,
    at: DateTime<Utc>,
) -> Result<PublishSchedule, DbError> {
    let mut tx = pool.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;
    if post.status != trendcast_core::PostStatus::Draft {
        return Err(post_transition_error(&post, "scheduled", "draft"));
    }
    let schedule = open_schedule(&mut tx, &post, at).await?;

    tx.commit().await?;
    Ok(schedule)
}

/// Validates the candidate, moves the draft to `scheduled` and opens its
/// pending schedule. The caller owns the transaction.
async fn open_schedule(
    conn: &mut PgConnection,
    post: &Post,
    at: DateTime<Utc>,
) -> Result<PublishSchedule, DbError> {
    let post_id = post.id;
    if let Some(candidate_id) = post.candidate_id {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM content_candidates WHERE id = $1 FOR UPDATE",
        )
        .bind(candidate_id)
        .fetch_optional(&mut *conn)
        .await?;

        match status.as_deref() {
            None => {
                return Err(DbError::NotFound {
                    entity: "candidate",
                    id: candidate_id,
                })
            }
            Some("approved") => {
                sqlx::query(
                    "UPDATE content_candidates SET status = 'scheduled', updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(candidate_id)
                .execute(&mut *conn)
                .await?;
            }
            Some("scheduled" | "published") => {}
            Some(other) => {
                return Err(DbError::InvalidTransition {
                    entity: "candidate",
                    id: candidate_id,
                    to: "scheduled".to_string(),
                    expected: format!("approved (is {other})"),
                });
            }
        }

        let busy: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM publish_schedules \
                            WHERE candidate_id = $1 AND platform = $2 AND status = 'pending')",
        )
        .bind(candidate_id)
        .bind(post.platform.as_str())
        .fetch_one(&mut *conn)
        .await?;

        if busy {
            return Err(DbError::Conflict(format!(
                "candidate {candidate_id} already has a pending {} schedule",
                post.platform
            )));
        }
    }

    sqlx::query(
        "UPDATE posts SET status = 'scheduled', scheduled_time = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(post_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    let sql = format!(
        "INSERT INTO publish_schedules (candidate_id, post_id, platform, scheduled_time, \
             retry_count) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {SCHEDULE_COLUMNS}"
    );
    let schedule = sqlx::query_as::<_, PublishScheduleRow>(&sql)
        .bind(post.candidate_id)
        .bind(post_id)
        .bind(post.platform.as_str())
        .bind(at)
        .bind(post.attempt - 1)
        .fetch_one(&mut *conn)
        .await?;

    schedule.try_into()
}

pub(crate) async fn unschedule_post(pool: &PgPool, post_id: i64) -> Result<Post, DbError> {
    let mut tx = pool.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;
    if post.status != trendcast_core::PostStatus::Scheduled {
        return Err(post_transition_error(&post, "draft", "scheduled"));
    }

    let sql = format!(
        "UPDATE posts SET status = 'draft', scheduled_time = NULL, updated_at = NOW() \
         WHERE id = $1 RETURNING {POST_COLUMNS}"
    );
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE publish_schedules SET status = 'cancelled', updated_at = NOW() \
         WHERE post_id = $1 AND status = 'pending'",
    )
    .bind(post_id)
    .execute(&mut *tx)
    .await?;

    if let Some(candidate_id) = post.candidate_id {
        release_candidate(&mut tx, candidate_id).await?;
    }

    tx.commit().await?;
    row.try_into()
}

pub(crate) async fn mark_post_posted(
    pool: &PgPool,
    post_id: i64,
    posted_at: DateTime<Utc>,
    external_post_id: &str,
) -> Result<Post, DbError> {
    let mut tx = pool.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;
    if post.status != trendcast_core::PostStatus::Scheduled {
        return Err(post_transition_error(&post, "posted", "scheduled"));
    }

    let sql = format!(
        "UPDATE posts SET status = 'posted', posted_time = $2, external_post_id = $3, \
             error_message = NULL, updated_at = NOW() \
         WHERE id = $1 RETURNING {POST_COLUMNS}"
    );
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(post_id)
        .bind(posted_at)
        .bind(external_post_id)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE publish_schedules SET status = 'published', published_at = $2, updated_at = NOW() \
         WHERE post_id = $1 AND status = 'pending'",
    )
    .bind(post_id)
    .bind(posted_at)
    .execute(&mut *tx)
    .await?;

    if let Some(candidate_id) = post.candidate_id {
        sqlx::query(
            "UPDATE content_candidates \
             SET status = 'published', published_at = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'scheduled'",
        )
        .bind(candidate_id)
        .bind(posted_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    row.try_into()
}

pub(crate) async fn mark_post_failed(
    pool: &PgPool,
    post_id: i64,
    error: &str,
) -> Result<Post, DbError> {
    let mut tx = pool.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;
    if post.status != trendcast_core::PostStatus::Scheduled {
        return Err(post_transition_error(&post, "failed", "scheduled"));
    }

    let sql = format!(
        "UPDATE posts SET status = 'failed', error_message = $2, updated_at = NOW() \
         WHERE id = $1 RETURNING {POST_COLUMNS}"
    );
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(post_id)
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE publish_schedules SET status = 'failed', error_message = $2, updated_at = NOW() \
         WHERE post_id = $1 AND status = 'pending'",
    )
    .bind(post_id)
    .bind(error)
    .execute(&mut *tx)
    .await?;

    if let Some(candidate_id) = post.candidate_id {
        release_candidate(&mut tx, candidate_id).await?;
    }

    tx.commit().await?;
    row.try_into()
}

pub(crate) async fn list_due_posts(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Post>, DbError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts \
         WHERE status = 'scheduled' AND scheduled_time BETWEEN $1 AND $2 \
         ORDER BY scheduled_time ASC, id ASC"
    );
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Post::try_from)
        .collect()
}

pub(crate) async fn list_posted_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<Post>, DbError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts \
         WHERE status = 'posted' AND external_post_id IS NOT NULL AND posted_time >= $1 \
         ORDER BY posted_time DESC, id DESC"
    );
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(since)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Post::try_from)
        .collect()
}

pub(crate) async fn list_schedules_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<PublishSchedule>, DbError> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM publish_schedules WHERE post_id = $1 ORDER BY id ASC"
    );
    sqlx::query_as::<_, PublishScheduleRow>(&sql)
        .bind(post_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(PublishSchedule::try_from)
        .collect()
}

pub(crate) async fn record_post_metrics(
    pool: &PgPool,
    post_id: i64,
    metrics: &ContentMetrics,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let candidate_id: Option<Option<i64>> = sqlx::query_scalar(
        "UPDATE posts SET views = $2, likes = $3, shares = $4, comments = $5, \
             engagement_rate = $6, updated_at = NOW() \
         WHERE id = $1 RETURNING candidate_id",
    )
    .bind(post_id)
    .bind(metrics.views)
    .bind(metrics.likes)
    .bind(metrics.shares)
    .bind(metrics.comments)
    .bind(metrics.engagement_rate)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(candidate_id) = candidate_id else {
        return Err(DbError::NotFound {
            entity: "post",
            id: post_id,
        });
    };

    if let Some(candidate_id) = candidate_id {
        sqlx::query(
            "UPDATE content_candidates SET views = $2, likes = $3, shares = $4, comments = $5, \
                 engagement_rate = $6, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(candidate_id)
        .bind(metrics.views)
        .bind(metrics.likes)
        .bind(metrics.shares)
        .bind(metrics.comments)
        .bind(metrics.engagement_rate)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
