use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A keyword tracked by the signal collectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchKeyword {
    pub keyword: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub related: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsFeed {
    pub name: String,
    pub url: String,
}

/// The watchlist file: what to track and which names carry extra weight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watchlist {
    pub keywords: Vec<WatchKeyword>,
    #[serde(default)]
    pub celebrities: Vec<String>,
    #[serde(default)]
    pub regional_terms: Vec<String>,
    #[serde(default)]
    pub trusted_sources: Vec<String>,
    #[serde(default)]
    pub subreddits: Vec<String>,
    #[serde(default)]
    pub news_feeds: Vec<NewsFeed>,
}

impl Watchlist {
    /// Whether `text` mentions any configured celebrity (case-insensitive).
    #[must_use]
    pub fn mentions_celebrity(&self, text: &str) -> bool {
        contains_any(text, &self.celebrities)
    }

    #[must_use]
    pub fn mentions_regional_term(&self, text: &str) -> bool {
        contains_any(text, &self.regional_terms)
    }

    #[must_use]
    pub fn is_trusted_source(&self, source: &str) -> bool {
        self.trusted_sources
            .iter()
            .any(|s| s.eq_ignore_ascii_case(source.trim()))
    }

    #[must_use]
    pub fn find(&self, keyword: &str) -> Option<&WatchKeyword> {
        self.keywords.iter().find(|k| k.keyword == keyword)
    }
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    let haystack = text.to_lowercase();
    needles
        .iter()
        .filter(|n| !n.trim().is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}

/// Load and validate the watchlist from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_watchlist(path: &Path) -> Result<Watchlist, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::WatchlistIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let watchlist: Watchlist = serde_yaml::from_str(&content)?;
    validate_watchlist(&watchlist)?;

    Ok(watchlist)
}

fn validate_watchlist(watchlist: &Watchlist) -> Result<(), ConfigError> {
    if watchlist.keywords.is_empty() {
        return Err(ConfigError::Validation(
            "watchlist must contain at least one keyword".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for entry in &watchlist.keywords {
        if entry.keyword.trim().is_empty() {
            return Err(ConfigError::Validation(
                "keyword must be non-empty".to_string(),
            ));
        }
        if !seen.insert(entry.keyword.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate keyword: '{}'",
                entry.keyword
            )));
        }
    }

    for feed in &watchlist.news_feeds {
        if !(feed.url.starts_with("http://") || feed.url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "news feed '{}' has a non-http url: {}",
                feed.name, feed.url
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "watchlist_test.rs"]
mod tests;
