//! Database operations for `news_items`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trendcast_core::{NewNewsItem, NewsItem};

use crate::DbError;

/// A row from the `news_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsItemRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NewsItemRow> for NewsItem {
    fn from(row: NewsItemRow) -> Self {
        NewsItem {
            id: row.id,
            title: row.title,
            description: row.description,
            url: row.url,
            source: row.source,
            image_url: row.image_url,
            published_at: row.published_at,
            is_used: row.is_used,
            created_at: row.created_at,
        }
    }
}

/// Inserts news items in one transaction, ignoring urls already present.
pub(crate) async fn insert_news_items(
    pool: &PgPool,
    items: &[NewNewsItem],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0_u64;

    for item in items {
        let result = sqlx::query(
            "INSERT INTO news_items (title, description, url, source, image_url, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (url) DO NOTHING",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.url)
        .bind(&item.source)
        .bind(item.image_url.as_deref())
        .bind(item.published_at)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(usize::try_from(inserted).unwrap_or(usize::MAX))
}

pub(crate) async fn freshest_unused_news(pool: &PgPool) -> Result<Option<NewsItem>, DbError> {
    let row = sqlx::query_as::<_, NewsItemRow>(
        "SELECT id, title, description, url, source, image_url, published_at, is_used, \
                created_at \
         FROM news_items \
         WHERE is_used = false \
         ORDER BY published_at DESC NULLS LAST, created_at DESC, id DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(NewsItem::from))
}

pub(crate) async fn mark_news_used(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE news_items SET is_used = true WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound {
            entity: "news item",
            id,
        });
    }
    Ok(())
}
