//! Viral score for a keyword from its aggregated signal metrics.
//!
//! The score is a sum of five capped factors and never exceeds 100. Missing,
//! negative, or non-finite inputs contribute nothing.

use serde::Serialize;
use trendcast_core::{Priority, ScoreBand};

/// Inputs for one keyword. `None` means the source did not report the factor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInput {
    pub mentions: Option<i64>,
    /// Mentions per minute.
    pub velocity: Option<f64>,
    pub engagement: Option<i64>,
    pub celebrity: bool,
    /// Mean sentiment in `[-1, 1]`.
    pub sentiment: Option<f64>,
}

/// Points awarded per factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub mentions: f64,
    pub velocity: f64,
    pub engagement: f64,
    pub celebrity: f64,
    pub sentiment: f64,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.mentions + self.velocity + self.engagement + self.celebrity + self.sentiment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViralScore {
    pub score: f64,
    pub band: ScoreBand,
    pub priority: Priority,
    pub breakdown: ScoreBreakdown,
}

const MAX_SCORE: f64 = 100.0;

/// Score one keyword.
#[must_use]
pub fn score(input: &ScoreInput) -> ViralScore {
    let breakdown = ScoreBreakdown {
        mentions: mention_points(input.mentions),
        velocity: velocity_points(input.velocity),
        engagement: engagement_points(input.engagement),
        celebrity: if input.celebrity { 10.0 } else { 0.0 },
        sentiment: sentiment_points(input.sentiment),
    };
    let score = breakdown.total().min(MAX_SCORE);
    let (band, priority) = classify(score);

    ViralScore {
        score,
        band,
        priority,
        breakdown,
    }
}

/// Band and priority for a score.
#[must_use]
pub fn classify(score: f64) -> (ScoreBand, Priority) {
    if score >= 80.0 {
        (ScoreBand::Urgent, Priority::Urgent)
    } else if score >= 60.0 {
        (ScoreBand::Rising, Priority::High)
    } else if score >= 40.0 {
        (ScoreBand::Emerging, Priority::Normal)
    } else {
        (ScoreBand::Low, Priority::Low)
    }
}

/// Sort by score, highest first. Equal scores keep their input order.
pub fn rank_by_score<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

fn mention_points(mentions: Option<i64>) -> f64 {
    match mentions {
        Some(m) if m > 1000 => 30.0,
        Some(m) if m > 500 => 20.0,
        Some(m) if m > 100 => 10.0,
        _ => 0.0,
    }
}

fn velocity_points(velocity: Option<f64>) -> f64 {
    match velocity.filter(|v| v.is_finite()) {
        Some(v) if v > 20.0 => 30.0,
        Some(v) if v > 10.0 => 20.0,
        Some(v) if v > 5.0 => 10.0,
        _ => 0.0,
    }
}

fn engagement_points(engagement: Option<i64>) -> f64 {
    match engagement {
        Some(e) if e > 10_000 => 20.0,
        Some(e) if e > 5_000 => 15.0,
        Some(e) if e > 1_000 => 10.0,
        _ => 0.0,
    }
}

fn sentiment_points(sentiment: Option<f64>) -> f64 {
    match sentiment.filter(|s| s.is_finite()) {
        Some(s) if !(-0.5..=0.8).contains(&s) => 10.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_input() -> ScoreInput {
        ScoreInput {
            mentions: Some(1500),
            velocity: Some(25.0),
            engagement: Some(8200),
            celebrity: true,
            sentiment: Some(0.9),
        }
    }

    #[test]
    fn hot_celebrity_trend_is_urgent() {
        let result = score(&full_input());
        assert!((result.score - 95.0).abs() < f64::EPSILON);
        assert_eq!(result.band, ScoreBand::Urgent);
        assert_eq!(result.priority, Priority::Urgent);
        assert!((result.breakdown.engagement - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_input_scores_zero() {
        let result = score(&ScoreInput::default());
        assert!(result.score.abs() < f64::EPSILON);
        assert_eq!(result.band, ScoreBand::Low);
        assert_eq!(result.priority, Priority::Low);
    }

    #[test]
    fn invalid_inputs_contribute_nothing() {
        let input = ScoreInput {
            mentions: Some(-5),
            velocity: Some(f64::NAN),
            engagement: Some(-1),
            celebrity: false,
            sentiment: Some(f64::INFINITY),
        };
        assert!(score(&input).score.abs() < f64::EPSILON);
    }

    #[test]
    fn thresholds_are_strict() {
        let at = |m| mention_points(Some(m));
        assert!((at(100) - 0.0).abs() < f64::EPSILON);
        assert!((at(101) - 10.0).abs() < f64::EPSILON);
        assert!((at(501) - 20.0).abs() < f64::EPSILON);
        assert!((at(1001) - 30.0).abs() < f64::EPSILON);
        assert!(sentiment_points(Some(-0.5)).abs() < f64::EPSILON);
        assert!((sentiment_points(Some(-0.51)) - 10.0).abs() < f64::EPSILON);
        assert!(sentiment_points(Some(0.8)).abs() < f64::EPSILON);
    }

    #[test]
    fn score_is_monotonic_in_each_factor() {
        let base = ScoreInput {
            mentions: Some(50),
            velocity: Some(1.0),
            engagement: Some(10),
            celebrity: false,
            sentiment: Some(0.0),
        };
        let low = score(&base).score;
        for bumped in [
            ScoreInput { mentions: Some(5_000), ..base },
            ScoreInput { velocity: Some(50.0), ..base },
            ScoreInput { engagement: Some(50_000), ..base },
            ScoreInput { celebrity: true, ..base },
            ScoreInput { sentiment: Some(-0.9), ..base },
        ] {
            let high = score(&bumped).score;
            assert!(high >= low, "{high} < {low}");
            assert!((0.0..=100.0).contains(&high));
        }
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(classify(80.0).0, ScoreBand::Urgent);
        assert_eq!(classify(79.9).0, ScoreBand::Rising);
        assert_eq!(classify(60.0).1, Priority::High);
        assert_eq!(classify(40.0).0, ScoreBand::Emerging);
        assert_eq!(classify(39.9).1, Priority::Low);
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let mut items = vec![("a", 50.0), ("b", 70.0), ("c", 50.0), ("d", 90.0)];
        rank_by_score(&mut items, |(_, s)| *s);
        let order: Vec<&str> = items.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec!["d", "b", "a", "c"]);
    }
}
