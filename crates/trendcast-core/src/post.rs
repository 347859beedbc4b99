use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::ContentMetrics;
use crate::{string_enum, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Twitter,
}

string_enum!(Platform, "platform", {
    Facebook => "facebook",
    Twitter => "twitter",
});

/// Publish status of a single post attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Posted,
    Failed,
}

string_enum!(PostStatus, "post status", {
    Draft => "draft",
    Scheduled => "scheduled",
    Posted => "posted",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostEvent {
    Schedule,
    Unschedule,
    Succeed,
    Fail,
}

string_enum!(PostEvent, "post event", {
    Schedule => "schedule",
    Unschedule => "unschedule",
    Succeed => "succeed",
    Fail => "fail",
});

impl PostStatus {
    /// Apply `event` to this status.
    ///
    /// The only legal moves are `draft -> scheduled`, `scheduled -> draft`,
    /// `scheduled -> posted` and `scheduled -> failed`. `posted` and `failed`
    /// accept nothing; a retry is a new post.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] for any other combination.
    pub fn apply(self, event: PostEvent) -> Result<PostStatus, CoreError> {
        match (self, event) {
            (PostStatus::Draft, PostEvent::Schedule) => Ok(PostStatus::Scheduled),
            (PostStatus::Scheduled, PostEvent::Unschedule) => Ok(PostStatus::Draft),
            (PostStatus::Scheduled, PostEvent::Succeed) => Ok(PostStatus::Posted),
            (PostStatus::Scheduled, PostEvent::Fail) => Ok(PostStatus::Failed),
            (from, event) => Err(CoreError::InvalidTransition { from, event }),
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PostStatus::Posted | PostStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Published,
    Failed,
    Cancelled,
}

string_enum!(ScheduleStatus, "schedule status", {
    Pending => "pending",
    Published => "published",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// One publish attempt of a piece of content on one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub candidate_id: Option<i64>,
    pub news_id: Option<i64>,
    pub platform: Platform,
    pub title: String,
    pub caption: String,
    pub image_path: Option<String>,
    pub status: PostStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub posted_time: Option<DateTime<Utc>>,
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
    pub attempt: i32,
    pub retry_of: Option<i64>,
    pub metrics: ContentMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A draft post to insert.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub candidate_id: Option<i64>,
    pub news_id: Option<i64>,
    pub platform: Platform,
    pub title: String,
    pub caption: String,
    pub image_path: Option<String>,
    pub attempt: i32,
    pub retry_of: Option<i64>,
}

impl NewPost {
    /// A follow-up attempt for a failed post, carrying over its content.
    #[must_use]
    pub fn retry_of(failed: &Post) -> Self {
        Self {
            candidate_id: failed.candidate_id,
            news_id: failed.news_id,
            platform: failed.platform,
            title: failed.title.clone(),
            caption: failed.caption.clone(),
            image_path: failed.image_path.clone(),
            attempt: failed.attempt + 1,
            retry_of: Some(failed.id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSchedule {
    pub id: i64,
    pub candidate_id: Option<i64>,
    pub post_id: i64,
    pub platform: Platform,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Upstream article available for ad hoc posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewNewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}
