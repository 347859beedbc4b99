//! Database operations for `content_candidates`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trendcast_core::{
    CandidateEdit, CandidateStatus, ContentCandidate, ContentMetrics, ContentStats, NewCandidate,
};

use crate::DbError;

pub(crate) const CANDIDATE_COLUMNS: &str = "id, trend_id, title, body, content_type, tone, \
     hashtags, image_keywords, viral_prediction_score, engagement_prediction, best_time_to_post, \
     priority, status, ab_group, ab_test_id, views, likes, shares, comments, engagement_rate, \
     created_at, updated_at, published_at";

/// A row from the `content_candidates` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub trend_id: i64,
    pub title: String,
    pub body: String,
    pub content_type: String,
    pub tone: String,
    pub hashtags: Vec<String>,
    pub image_keywords: Vec<String>,
    pub viral_prediction_score: f64,
    pub engagement_prediction: f64,
    pub best_time_to_post: Option<DateTime<Utc>>,
    pub priority: String,
    pub status: String,
    pub ab_group: Option<String>,
    pub ab_test_id: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub engagement_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl TryFrom<CandidateRow> for ContentCandidate {
    type Error = DbError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        Ok(ContentCandidate {
            id: row.id,
            trend_id: row.trend_id,
            title: row.title,
            body: row.body,
            content_type: row.content_type.parse()?,
            tone: row.tone.parse()?,
            hashtags: row.hashtags,
            image_keywords: row.image_keywords,
            viral_prediction_score: row.viral_prediction_score,
            engagement_prediction: row.engagement_prediction,
            best_time_to_post: row.best_time_to_post,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            ab_group: row.ab_group,
            ab_test_id: row.ab_test_id,
            metrics: ContentMetrics {
                views: row.views,
                likes: row.likes,
                shares: row.shares,
                comments: row.comments,
                engagement_rate: row.engagement_rate,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
        })
    }
}

/// Inserts a generated batch inside one transaction.
///
/// If any insert fails the transaction is dropped without commit and no rows
/// from the batch remain.
pub(crate) async fn insert_candidates(
    pool: &PgPool,
    batch: &[NewCandidate],
) -> Result<Vec<ContentCandidate>, DbError> {
    let sql = format!(
        "INSERT INTO content_candidates (trend_id, title, body, content_type, tone, hashtags, \
             image_keywords, viral_prediction_score, engagement_prediction, best_time_to_post, \
             priority, ab_group, ab_test_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {CANDIDATE_COLUMNS}"
    );

    let mut tx = pool.begin().await?;
    let mut inserted = Vec::with_capacity(batch.len());

    for candidate in batch {
        let row = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(candidate.trend_id)
            .bind(&candidate.title)
            .bind(&candidate.body)
            .bind(candidate.content_type.as_str())
            .bind(candidate.tone.as_str())
            .bind(candidate.hashtags.as_slice())
            .bind(candidate.image_keywords.as_slice())
            .bind(candidate.viral_prediction_score)
            .bind(candidate.engagement_prediction)
            .bind(candidate.best_time_to_post)
            .bind(candidate.priority.as_str())
            .bind(candidate.ab_group.as_deref())
            .bind(candidate.ab_test_id.as_deref())
            .fetch_one(&mut *tx)
            .await?;
        inserted.push(ContentCandidate::try_from(row)?);
    }

    tx.commit().await?;
    Ok(inserted)
}

pub(crate) async fn get_candidate(pool: &PgPool, id: i64) -> Result<ContentCandidate, DbError> {
    let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM content_candidates WHERE id = $1");
    sqlx::query_as::<_, CandidateRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound {
            entity: "candidate",
            id,
        })?
        .try_into()
}

pub(crate) async fn list_candidates(
    pool: &PgPool,
    trend_id: i64,
    status: Option<CandidateStatus>,
) -> Result<Vec<ContentCandidate>, DbError> {
    let sql = format!(
        "SELECT {CANDIDATE_COLUMNS} FROM content_candidates \
         WHERE trend_id = $1 AND ($2::text IS NULL OR status = $2) \
         ORDER BY viral_prediction_score DESC, id ASC"
    );
    sqlx::query_as::<_, CandidateRow>(&sql)
        .bind(trend_id)
        .bind(status.map(CandidateStatus::as_str))
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(ContentCandidate::try_from)
        .collect()
}

/// Moves a candidate to `next` if its current status allows it.
pub(crate) async fn set_candidate_status(
    pool: &PgPool,
    id: i64,
    next: CandidateStatus,
) -> Result<ContentCandidate, DbError> {
    let allowed: Vec<String> = CandidateStatus::sources_for(next)
        .into_iter()
        .map(|s| s.as_str().to_string())
        .collect();

    let sql = format!(
        "UPDATE content_candidates \
         SET status = $2, updated_at = NOW(), \
             published_at = CASE WHEN $2 = 'published' THEN NOW() ELSE published_at END \
         WHERE id = $1 AND status = ANY($3) \
         RETURNING {CANDIDATE_COLUMNS}"
    );

    let row = sqlx::query_as::<_, CandidateRow>(&sql)
        .bind(id)
        .bind(next.as_str())
        .bind(&allowed)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => row.try_into(),
        None => {
            // Distinguish a missing row from a disallowed move.
            get_candidate(pool, id).await?;
            Err(DbError::InvalidTransition {
                entity: "candidate",
                id,
                to: next.as_str().to_string(),
                expected: allowed.join(" | "),
            })
        }
    }
}

pub(crate) async fn edit_candidate(
    pool: &PgPool,
    id: i64,
    edit: &CandidateEdit,
) -> Result<ContentCandidate, DbError> {
    let sql = format!(
        "UPDATE content_candidates \
         SET title = COALESCE($2, title), \
             body = COALESCE($3, body), \
             hashtags = COALESCE($4, hashtags), \
             best_time_to_post = COALESCE($5, best_time_to_post), \
             updated_at = NOW() \
         WHERE id = $1 AND status NOT IN ('published', 'rejected') \
         RETURNING {CANDIDATE_COLUMNS}"
    );

    let row = sqlx::query_as::<_, CandidateRow>(&sql)
        .bind(id)
        .bind(edit.title.as_deref())
        .bind(edit.body.as_deref())
        .bind(edit.hashtags.as_deref())
        .bind(edit.best_time_to_post)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => row.try_into(),
        None => {
            let current = get_candidate(pool, id).await?;
            Err(DbError::InvalidTransition {
                entity: "candidate",
                id,
                to: "edited".to_string(),
                expected: format!("non-terminal (is {})", current.status),
            })
        }
    }
}

pub(crate) async fn content_stats(pool: &PgPool) -> Result<ContentStats, DbError> {
    let by_status: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*)::bigint FROM content_candidates GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let by_type: Vec<(String, i64)> = sqlx::query_as(
        "SELECT content_type, COUNT(*)::bigint FROM content_candidates GROUP BY content_type",
    )
    .fetch_all(pool)
    .await?;

    let (avg_viral_prediction, published_avg_engagement_rate): (f64, f64) = sqlx::query_as(
        "SELECT COALESCE(AVG(viral_prediction_score), 0)::float8, \
                COALESCE(AVG(engagement_rate) FILTER (WHERE status = 'published'), 0)::float8 \
         FROM content_candidates",
    )
    .fetch_one(pool)
    .await?;

    let by_status: BTreeMap<String, i64> = by_status.into_iter().collect();
    Ok(ContentStats {
        total: by_status.values().sum(),
        by_status,
        by_type: by_type.into_iter().collect(),
        avg_viral_prediction,
        published_avg_engagement_rate,
    })
}
