//! Heuristic viral prediction for a single news article.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use trendcast_core::Watchlist;

const EMOTIONAL_WORDS: &[&str] = &[
    "amazing",
    "shocking",
    "unbelievable",
    "disaster",
    "controversy",
    "stunning",
    "heartbreak",
];

const CONTROVERSIAL_WORDS: &[&str] = &["var", "red card", "penalty", "offside", "handball"];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// The article being judged.
#[derive(Debug, Clone, Copy)]
pub struct ArticleInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub source: &'a str,
    pub category: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViralPrediction {
    pub score: f64,
    pub factors: Vec<String>,
    pub recommendation: String,
}

/// Predict how likely an article is to go viral if posted at `local_hour`.
#[must_use]
pub fn predict_viral(
    article: &ArticleInput<'_>,
    local_hour: u32,
    watchlist: &Watchlist,
) -> ViralPrediction {
    let title = article.title.to_lowercase();
    let description = article.description.to_lowercase();
    let mut score = 0.0;
    let mut factors = Vec::new();

    if watchlist.mentions_celebrity(article.title) {
        score += 20.0;
        factors.push("celebrity mention".to_string());
    }
    if EMOTIONAL_WORDS
        .iter()
        .any(|w| title.contains(w) || description.contains(w))
    {
        score += 20.0;
        factors.push("emotional content".to_string());
    }
    if DIGITS.is_match(article.title) {
        score += 15.0;
        factors.push("contains numbers".to_string());
    }
    if watchlist.mentions_regional_term(article.title) {
        score += 10.0;
        factors.push("regional relevance".to_string());
    }
    if CONTROVERSIAL_WORDS.iter().any(|w| contains_word(&title, w)) {
        score += 20.0;
        factors.push("controversial topic".to_string());
    }
    if (20..=22).contains(&local_hour) {
        score += 15.0;
        factors.push("peak posting time".to_string());
    }
    if watchlist.is_trusted_source(article.source) {
        factors.push(format!("trusted source: {}", article.source.trim()));
        if !article.category.trim().is_empty() {
            factors.push(format!("category: {}", article.category.trim()));
        }
    }

    let score = f64::min(score, 100.0);
    ViralPrediction {
        score,
        factors,
        recommendation: recommendation(score).to_string(),
    }
}

fn recommendation(score: f64) -> &'static str {
    if score >= 70.0 {
        "post now"
    } else if score >= 50.0 {
        "consider posting"
    } else {
        "low priority"
    }
}

/// Whole-word match so "var" does not fire on "various".
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchlist() -> Watchlist {
        Watchlist {
            celebrities: vec!["Messi".to_string(), "Haaland".to_string()],
            regional_terms: vec!["V-League".to_string()],
            trusted_sources: vec!["BBC Sport".to_string()],
            ..Watchlist::default()
        }
    }

    fn article<'a>(title: &'a str, description: &'a str) -> ArticleInput<'a> {
        ArticleInput {
            title,
            description,
            source: "BBC Sport",
            category: "football",
        }
    }

    #[test]
    fn stacked_factors_cap_at_one_hundred() {
        let prediction = predict_viral(
            &article("Messi shocking VAR penalty in 3-2 V-League thriller", ""),
            21,
            &watchlist(),
        );
        assert!((prediction.score - 100.0).abs() < f64::EPSILON);
        assert_eq!(prediction.recommendation, "post now");
    }

    #[test]
    fn plain_article_is_low_priority() {
        let prediction = predict_viral(&article("Training report", "quiet day"), 9, &watchlist());
        assert!(prediction.score.abs() < f64::EPSILON);
        assert_eq!(prediction.recommendation, "low priority");
    }

    #[test]
    fn emotional_word_in_description_counts() {
        let prediction = predict_viral(
            &article("Haaland update", "An unbelievable turn of events"),
            10,
            &watchlist(),
        );
        assert!((prediction.score - 40.0).abs() < f64::EPSILON);
        assert!(prediction
            .factors
            .contains(&"emotional content".to_string()));
    }

    #[test]
    fn consider_posting_between_fifty_and_seventy() {
        let prediction = predict_viral(&article("Haaland scores 2", "amazing"), 10, &watchlist());
        assert!((prediction.score - 55.0).abs() < f64::EPSILON);
        assert_eq!(prediction.recommendation, "consider posting");
    }

    #[test]
    fn controversial_terms_match_whole_words() {
        assert!(contains_word("late var check", "var"));
        assert!(!contains_word("various clubs", "var"));
    }

    #[test]
    fn trusted_source_is_recorded_as_factor() {
        let prediction = predict_viral(&article("Report", ""), 10, &watchlist());
        assert!(prediction
            .factors
            .iter()
            .any(|f| f == "trusted source: BBC Sport"));
    }
}
