use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::string_enum;
use crate::trend::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    News,
    Meme,
    HotTake,
    Analysis,
    FanOpinion,
    ImageCaption,
}

string_enum!(ContentType, "content type", {
    News => "news",
    Meme => "meme",
    HotTake => "hot_take",
    Analysis => "analysis",
    FanOpinion => "fan_opinion",
    ImageCaption => "image_caption",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Humorous,
    Serious,
    Sarcastic,
    Emotional,
    Neutral,
}

string_enum!(Tone, "tone", {
    Humorous => "humorous",
    Serious => "serious",
    Sarcastic => "sarcastic",
    Emotional => "emotional",
    Neutral => "neutral",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Suggested,
    Approved,
    Scheduled,
    Published,
    Rejected,
}

string_enum!(CandidateStatus, "candidate status", {
    Suggested => "suggested",
    Approved => "approved",
    Scheduled => "scheduled",
    Published => "published",
    Rejected => "rejected",
});

impl CandidateStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CandidateStatus::Published | CandidateStatus::Rejected)
    }

    /// Whether a candidate may move from `self` to `next`.
    ///
    /// `Scheduled -> Approved` is the unschedule path.
    #[must_use]
    pub fn can_transition_to(self, next: CandidateStatus) -> bool {
        use CandidateStatus::{Approved, Published, Rejected, Scheduled, Suggested};
        matches!(
            (self, next),
            (Suggested, Approved | Rejected)
                | (Approved, Scheduled | Rejected)
                | (Scheduled, Published | Approved)
        )
    }

    /// States a candidate may be in when it is moved to `next`.
    #[must_use]
    pub fn sources_for(next: CandidateStatus) -> Vec<CandidateStatus> {
        [
            CandidateStatus::Suggested,
            CandidateStatus::Approved,
            CandidateStatus::Scheduled,
            CandidateStatus::Published,
            CandidateStatus::Rejected,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .collect()
    }
}

/// Post-publish engagement figures, shared by candidates and posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub engagement_rate: f64,
}

impl ContentMetrics {
    /// Build metrics from raw counters, deriving the engagement rate from views.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(views: i64, likes: i64, shares: i64, comments: i64) -> Self {
        let interactions = likes + shares + comments;
        let engagement_rate = if views > 0 {
            ((interactions as f64 / views as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            views,
            likes,
            shares,
            comments,
            engagement_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCandidate {
    pub id: i64,
    pub trend_id: i64,
    pub title: String,
    pub body: String,
    pub content_type: ContentType,
    pub tone: Tone,
    pub hashtags: Vec<String>,
    pub image_keywords: Vec<String>,
    pub viral_prediction_score: f64,
    pub engagement_prediction: f64,
    pub best_time_to_post: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub status: CandidateStatus,
    pub ab_group: Option<String>,
    pub ab_test_id: Option<String>,
    pub metrics: ContentMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A generated candidate that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCandidate {
    pub trend_id: i64,
    pub title: String,
    pub body: String,
    pub content_type: ContentType,
    pub tone: Tone,
    pub hashtags: Vec<String>,
    pub image_keywords: Vec<String>,
    pub viral_prediction_score: f64,
    pub engagement_prediction: f64,
    pub best_time_to_post: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub ab_group: Option<String>,
    pub ab_test_id: Option<String>,
}

/// Manual edits applied to a candidate; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub best_time_to_post: Option<DateTime<Utc>>,
}

impl CandidateEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.hashtags.is_none()
            && self.best_time_to_post.is_none()
    }
}

/// Aggregate counts over all stored candidates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub avg_viral_prediction: f64,
    pub published_avg_engagement_rate: f64,
}
