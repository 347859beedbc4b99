//! Database operations for `trends`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use trendcast_core::{SourceMetrics, TopSample, Trend, TrendUpsert};

use crate::DbError;

const TREND_COLUMNS: &str = "id, keyword, category, viral_score, momentum_score, mention_count, \
     velocity, total_engagement, sentiment_score, celebrity, source_metrics, band, status, \
     priority, is_active, detected_at, last_seen_at, peak_at, ended_at, low_momentum_since, \
     related_keywords, top_samples";

/// A row from the `trends` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendRow {
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
    pub source_metrics: Json<BTreeMap<String, SourceMetrics>>,
    pub band: String,
    pub status: String,
    pub priority: String,
    pub is_active: bool,
    pub detected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub peak_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub low_momentum_since: Option<DateTime<Utc>>,
    pub related_keywords: Vec<String>,
    pub top_samples: Json<Vec<TopSample>>,
}

impl TryFrom<TrendRow> for Trend {
    type Error = DbError;

    fn try_from(row: TrendRow) -> Result<Self, Self::Error> {
        Ok(Trend {
            id: row.id,
            keyword: row.keyword,
            category: row.category,
            viral_score: row.viral_score,
            momentum_score: row.momentum_score,
            mention_count: row.mention_count,
            velocity: row.velocity,
            total_engagement: row.total_engagement,
            sentiment_score: row.sentiment_score,
            celebrity: row.celebrity,
            source_metrics: row.source_metrics.0,
            band: row.band.parse()?,
            status: row.status.parse()?,
            priority: row.priority.parse()?,
            is_active: row.is_active,
            detected_at: row.detected_at,
            last_seen_at: row.last_seen_at,
            peak_at: row.peak_at,
            ended_at: row.ended_at,
            low_momentum_since: row.low_momentum_since,
            related_keywords: row.related_keywords,
            top_samples: row.top_samples.0,
        })
    }
}

/// Insert or update a trend by keyword in one statement.
///
/// `detected_at` keeps its first value; `peak_at` is only filled if still
/// null; re-detection clears `ended_at` and reactivates the row.
pub(crate) async fn upsert_trend(pool: &PgPool, trend: &TrendUpsert) -> Result<Trend, DbError> {
    let sql = format!(
        "INSERT INTO trends (keyword, category, viral_score, momentum_score, mention_count, \
             velocity, total_engagement, sentiment_score, celebrity, source_metrics, band, \
             status, priority, is_active, detected_at, last_seen_at, peak_at, \
             low_momentum_since, related_keywords, top_samples) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, true, $14, $14, \
                 $15, $16, $17, $18) \
         ON CONFLICT (keyword) DO UPDATE SET \
             category = EXCLUDED.category, \
             viral_score = EXCLUDED.viral_score, \
             momentum_score = EXCLUDED.momentum_score, \
             mention_count = EXCLUDED.mention_count, \
             velocity = EXCLUDED.velocity, \
             total_engagement = EXCLUDED.total_engagement, \
             sentiment_score = EXCLUDED.sentiment_score, \
             celebrity = EXCLUDED.celebrity, \
             source_metrics = EXCLUDED.source_metrics, \
             band = EXCLUDED.band, \
             status = EXCLUDED.status, \
             priority = EXCLUDED.priority, \
             is_active = true, \
             last_seen_at = EXCLUDED.last_seen_at, \
             peak_at = COALESCE(trends.peak_at, EXCLUDED.peak_at), \
             ended_at = NULL, \
             low_momentum_since = EXCLUDED.low_momentum_since, \
             related_keywords = EXCLUDED.related_keywords, \
             top_samples = EXCLUDED.top_samples, \
             updated_at = NOW() \
         RETURNING {TREND_COLUMNS}"
    );

    let row = sqlx::query_as::<_, TrendRow>(&sql)
        .bind(&trend.keyword)
        .bind(&trend.category)
        .bind(trend.viral_score)
        .bind(trend.momentum_score)
        .bind(trend.mention_count)
        .bind(trend.velocity)
        .bind(trend.total_engagement)
        .bind(trend.sentiment_score)
        .bind(trend.celebrity)
        .bind(Json(&trend.source_metrics))
        .bind(trend.band.as_str())
        .bind(trend.status.as_str())
        .bind(trend.priority.as_str())
        .bind(trend.seen_at)
        .bind(trend.peak_at)
        .bind(trend.low_momentum_since)
        .bind(trend.related_keywords.as_slice())
        .bind(Json(&trend.top_samples))
        .fetch_one(pool)
        .await?;

    row.try_into()
}

pub(crate) async fn get_trend(pool: &PgPool, id: i64) -> Result<Trend, DbError> {
    let sql = format!("SELECT {TREND_COLUMNS} FROM trends WHERE id = $1");
    sqlx::query_as::<_, TrendRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound { entity: "trend", id })?
        .try_into()
}

pub(crate) async fn find_trend_by_keyword(
    pool: &PgPool,
    keyword: &str,
) -> Result<Option<Trend>, DbError> {
    let sql = format!("SELECT {TREND_COLUMNS} FROM trends WHERE keyword = $1");
    sqlx::query_as::<_, TrendRow>(&sql)
        .bind(keyword)
        .fetch_optional(pool)
        .await?
        .map(Trend::try_from)
        .transpose()
}

pub(crate) async fn list_active_trends(pool: &PgPool) -> Result<Vec<Trend>, DbError> {
    let sql = format!(
        "SELECT {TREND_COLUMNS} FROM trends WHERE is_active = true \
         ORDER BY viral_score DESC, detected_at ASC, id ASC"
    );
    sqlx::query_as::<_, TrendRow>(&sql)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Trend::try_from)
        .collect()
}

pub(crate) async fn deactivate_trend(
    pool: &PgPool,
    id: i64,
    ended_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE trends \
         SET is_active = false, status = 'dead', ended_at = COALESCE(ended_at, $2), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(ended_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound { entity: "trend", id });
    }
    Ok(())
}

/// Deletes a trend; `content_candidates` rows go with it via `ON DELETE CASCADE`.
pub(crate) async fn delete_trend(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM trends WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound { entity: "trend", id });
    }
    Ok(())
}
