//! Candidate generation for a detected trend.
//!
//! [`plan_candidates`] is pure apart from the injected random source;
//! [`generate_candidates`] plans a batch and stores it in one transaction.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trendcast_core::{ContentCandidate, ContentType, NewCandidate, Priority, Tone, Trend};
use trendcast_db::Repository;

use crate::error::ContentError;
use crate::templates::{
    emoji_set, render, templates_for, type_hashtags, type_image_terms, BASE_HASHTAGS,
    BASE_IMAGE_TERMS,
};

const MAX_HASHTAGS: usize = 8;
const MAX_IMAGE_KEYWORDS: usize = 6;
const PEAK_HOURS: [u32; 3] = [12, 18, 21];

/// Content types to produce for a trend, best first.
#[must_use]
pub fn select_types(viral_score: f64, sentiment: f64) -> Vec<ContentType> {
    use ContentType::{Analysis, FanOpinion, HotTake, ImageCaption, Meme, News};

    let mut types = if viral_score >= 80.0 {
        vec![Meme, HotTake, ImageCaption, FanOpinion, News, Analysis]
    } else if viral_score >= 60.0 {
        vec![HotTake, Meme, FanOpinion, News, ImageCaption]
    } else {
        vec![News, FanOpinion, Meme, Analysis]
    };

    if sentiment < -0.3 {
        move_to_slot(&mut types, HotTake, 0);
    } else if sentiment > 0.5 {
        move_to_slot(&mut types, FanOpinion, 1);
    }
    types
}

fn move_to_slot(types: &mut Vec<ContentType>, wanted: ContentType, slot: usize) {
    types.retain(|t| *t != wanted);
    types.insert(slot.min(types.len()), wanted);
}

#[must_use]
pub fn tone_for(content_type: ContentType, sentiment: f64) -> Tone {
    match content_type {
        ContentType::News => Tone::Neutral,
        ContentType::Meme | ContentType::ImageCaption => Tone::Humorous,
        ContentType::HotTake if sentiment < 0.0 => Tone::Sarcastic,
        ContentType::HotTake | ContentType::Analysis => Tone::Serious,
        ContentType::FanOpinion if sentiment.abs() > 0.5 => Tone::Emotional,
        ContentType::FanOpinion => Tone::Neutral,
    }
}

fn type_multiplier(content_type: ContentType) -> f64 {
    match content_type {
        ContentType::Meme => 1.2,
        ContentType::HotTake => 1.15,
        ContentType::ImageCaption => 1.1,
        ContentType::FanOpinion => 1.05,
        ContentType::News => 1.0,
        ContentType::Analysis => 0.9,
    }
}

fn tone_multiplier(tone: Tone) -> f64 {
    match tone {
        Tone::Humorous => 1.15,
        Tone::Sarcastic => 1.1,
        Tone::Emotional => 1.08,
        Tone::Serious => 1.0,
        Tone::Neutral => 0.95,
    }
}

fn engagement_adjustment(content_type: ContentType) -> f64 {
    match content_type {
        ContentType::Meme => 1.5,
        ContentType::ImageCaption => 1.3,
        ContentType::HotTake => 1.2,
        ContentType::FanOpinion => 1.1,
        ContentType::News => 1.0,
        ContentType::Analysis => 0.8,
    }
}

/// Predicted viral score for the candidate at 1-based `rank`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn predict_score(
    trend_score: f64,
    content_type: ContentType,
    tone: Tone,
    rank: usize,
    jitter: f64,
) -> f64 {
    let rank_factor = 1.0 - 0.03 * rank as f64;
    let raw = trend_score
        * 0.8
        * type_multiplier(content_type)
        * tone_multiplier(tone)
        * rank_factor
        * jitter;
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[must_use]
pub fn predict_engagement(predicted: f64, content_type: ContentType) -> f64 {
    (predicted * 0.05 * engagement_adjustment(content_type) * 100.0).round() / 100.0
}

fn candidate_priority(predicted: f64, trend_score: f64) -> Priority {
    let avg = (predicted + trend_score) / 2.0;
    if avg >= 80.0 {
        Priority::Urgent
    } else if avg >= 65.0 {
        Priority::High
    } else if avg >= 40.0 {
        Priority::Normal
    } else {
        Priority::Low
    }
}

/// When a candidate for a trend with `viral_score` should go out.
///
/// Hot trends post immediately or within the hour; everything else waits for
/// the next local peak hour.
pub fn best_posting_time<R: Rng>(
    viral_score: f64,
    now: DateTime<Utc>,
    offset: FixedOffset,
    rng: &mut R,
) -> Option<DateTime<Utc>> {
    if viral_score >= 80.0 {
        return Some(now);
    }
    if viral_score >= 60.0 {
        return Some(now + Duration::minutes(rng.random_range(15..=60)));
    }
    next_peak_hour(now, offset)
}

fn next_peak_hour(now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let local = now.with_timezone(&offset);
    let (date, hour) = match PEAK_HOURS.iter().find(|h| **h > local.hour()) {
        Some(h) => (local.date_naive(), *h),
        None => (local.date_naive().succ_opt()?, PEAK_HOURS[0]),
    };
    let at = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);
    offset
        .from_local_datetime(&at)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn hashtags(keyword: &str, content_type: ContentType) -> Vec<String> {
    let compact: String = keyword.chars().filter(|c| !c.is_whitespace()).collect();
    let mut tags: Vec<String> = Vec::with_capacity(MAX_HASHTAGS);
    let candidates = std::iter::once(compact.as_str())
        .chain(BASE_HASHTAGS.iter().copied())
        .chain(type_hashtags(content_type).iter().copied());
    for tag in candidates {
        if tag.is_empty() || tags.iter().any(|t| t[1..].eq_ignore_ascii_case(tag)) {
            continue;
        }
        tags.push(format!("#{tag}"));
        if tags.len() == MAX_HASHTAGS {
            break;
        }
    }
    tags
}

fn image_keywords(keyword: &str, content_type: ContentType) -> Vec<String> {
    let mut terms: Vec<String> = Vec::with_capacity(MAX_IMAGE_KEYWORDS);
    let candidates = std::iter::once(keyword)
        .chain(BASE_IMAGE_TERMS.iter().copied())
        .chain(type_image_terms(content_type).iter().copied());
    for term in candidates {
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
            terms.push(term.to_string());
        }
        if terms.len() == MAX_IMAGE_KEYWORDS {
            break;
        }
    }
    terms
}

/// Plan up to `count` candidates for `trend`.
///
/// At most `2 × types` candidates are produced. When `count` exceeds the
/// type list, the leading types get a second variant: the pair shares an
/// `ab_test_id` and is split into groups `A` and `B`.
pub fn plan_candidates<R: Rng>(
    trend: &Trend,
    count: usize,
    now: DateTime<Utc>,
    offset: FixedOffset,
    rng: &mut R,
) -> Vec<NewCandidate> {
    let types = select_types(trend.viral_score, trend.sentiment_score);
    let total = count.min(types.len() * 2);
    let primaries = total.min(types.len());
    let variants = total - primaries;

    let ab_ids: Vec<String> = (0..variants)
        .map(|_| format!("ab-{}-{:08x}", trend.id, rng.random::<u32>()))
        .collect();

    let mut slots: Vec<(ContentType, Option<(&str, &str)>)> = Vec::with_capacity(total);
    for (i, content_type) in types.iter().take(primaries).enumerate() {
        slots.push((*content_type, ab_ids.get(i).map(|id| ("A", id.as_str()))));
    }
    for (i, content_type) in types.iter().take(variants).enumerate() {
        slots.push((*content_type, Some(("B", ab_ids[i].as_str()))));
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, (content_type, ab))| {
            build_candidate(trend, content_type, i + 1, ab, now, offset, rng)
        })
        .collect()
}

fn build_candidate<R: Rng>(
    trend: &Trend,
    content_type: ContentType,
    rank: usize,
    ab: Option<(&str, &str)>,
    now: DateTime<Utc>,
    offset: FixedOffset,
    rng: &mut R,
) -> NewCandidate {
    let sentiment = trend.sentiment_score;
    let tone = tone_for(content_type, sentiment);

    let templates = templates_for(content_type);
    let template = &templates[rng.random_range(0..templates.len())];
    let emojis = emoji_set(sentiment);
    let emoji = emojis[rng.random_range(0..emojis.len())];

    let predicted = predict_score(
        trend.viral_score,
        content_type,
        tone,
        rank,
        rng.random_range(0.95..=1.05),
    );

    NewCandidate {
        trend_id: trend.id,
        title: render(template.title, &trend.keyword, emoji),
        body: render(template.body, &trend.keyword, emoji),
        content_type,
        tone,
        hashtags: hashtags(&trend.keyword, content_type),
        image_keywords: image_keywords(&trend.keyword, content_type),
        viral_prediction_score: predicted,
        engagement_prediction: predict_engagement(predicted, content_type),
        best_time_to_post: best_posting_time(trend.viral_score, now, offset, rng),
        priority: candidate_priority(predicted, trend.viral_score),
        ab_group: ab.map(|(group, _)| group.to_string()),
        ab_test_id: ab.map(|(_, id)| id.to_string()),
    }
}

/// Generate and store up to `count` candidates for `trend`.
///
/// The batch is inserted all-or-nothing.
///
/// # Errors
///
/// Returns [`ContentError::Storage`] if the batch insert fails; nothing is
/// stored in that case.
pub async fn generate_candidates(
    repo: &dyn Repository,
    trend: &Trend,
    count: usize,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Vec<ContentCandidate>, ContentError> {
    let batch = {
        let mut rng = StdRng::from_os_rng();
        plan_candidates(trend, count, now, offset, &mut rng)
    };
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let stored = repo.insert_candidates(&batch).await?;
    tracing::info!(
        trend_id = trend.id,
        keyword = %trend.keyword,
        count = stored.len(),
        "generated content candidates"
    );
    Ok(stored)
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod tests;
