//! Content for trends: candidate generation and caption writing.

pub mod error;
pub mod generator;
pub mod text;

mod templates;

pub use error::ContentError;
pub use generator::{
    best_posting_time, generate_candidates, plan_candidates, predict_engagement, predict_score,
    select_types, tone_for,
};
pub use text::{
    caption_for_news, decode_caption, fallback_caption, CaptionDraft, OllamaClient, TextGenerator,
};
