//! Trend signals: collection, viral scoring, and trend detection.
//!
//! Sources report keyword mentions, the scorer turns merged metrics into a
//! 0..=100 viral score, and [`detect_trends`] keeps the `trends` table in
//! step with what the sources currently see.

pub mod detect;
pub mod error;
pub mod predict;
pub mod scorer;
pub mod sources;

mod lexicon;

pub use detect::{
    detect_trends, plan_trend_update, should_create_content, should_deactivate, DetectionPolicy,
    DetectionReport,
};
pub use error::SignalError;
pub use lexicon::lexicon_score;
pub use predict::{predict_viral, ArticleInput, ViralPrediction};
pub use scorer::{classify, rank_by_score, score, ScoreBreakdown, ScoreInput, ViralScore};
pub use sources::{
    collect_signals, merge_signals, parse_feed, KeywordSignal, NewsFeedSource, RawSignal,
    RedditSource, SignalSource,
};
