//! Reddit public search as a mention source.
//!
//! One search request per keyword over the configured subreddits. Posts
//! created inside the window count as mentions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use trendcast_core::{TopSample, WatchKeyword};

use super::{RawSignal, SignalSource};
use crate::error::SignalError;
use crate::lexicon::lexicon_score;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com/";
const PAGE_LIMIT: usize = 100;
const MAX_SAMPLES: usize = 3;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    #[serde(default)]
    title: String,
    permalink: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    created_utc: f64,
}

pub struct RedditSource {
    client: Client,
    base_url: Url,
    subreddits: Vec<String>,
    window: Duration,
}

impl RedditSource {
    /// Source pointed at reddit.com.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Http`] if the HTTP client cannot be built.
    pub fn new(
        user_agent: &str,
        timeout_secs: u64,
        subreddits: Vec<String>,
    ) -> Result<Self, SignalError> {
        Self::with_base_url(user_agent, timeout_secs, subreddits, DEFAULT_BASE_URL)
    }

    /// Source with a custom base URL (for wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Http`] if the HTTP client cannot be built, or
    /// [`SignalError::BaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        user_agent: &str,
        timeout_secs: u64,
        subreddits: Vec<String>,
        base_url: &str,
    ) -> Result<Self, SignalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SignalError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            subreddits,
            window: Duration::from_secs(60 * 60),
        })
    }

    /// Counting window; posts older than this are ignored.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn search_url(&self, keyword: &str) -> Url {
        let path = if self.subreddits.is_empty() {
            "search.json".to_string()
        } else {
            format!("r/{}/search.json", self.subreddits.join("+"))
        };
        let mut url = self.base_url.join(&path).unwrap_or_else(|_| self.base_url.clone());
        url.query_pairs_mut()
            .append_pair("q", &format!("\"{keyword}\""))
            .append_pair(
                "restrict_sr",
                if self.subreddits.is_empty() { "false" } else { "true" },
            )
            .append_pair("sort", "new")
            .append_pair("t", "day")
            .append_pair("limit", &PAGE_LIMIT.to_string());
        url
    }

    async fn search(&self, keyword: &str) -> Result<RawSignal, SignalError> {
        let url = self.search_url(keyword);
        let body = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let listing: Listing =
            serde_json::from_str(&body).map_err(|e| SignalError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        Ok(self.to_signal(keyword, listing))
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_signal(&self, keyword: &str, listing: Listing) -> RawSignal {
        let window_secs = self.window.as_secs_f64();
        let cutoff = Utc::now().timestamp() as f64 - window_secs;

        let mut recent: Vec<PostData> = listing
            .data
            .children
            .into_iter()
            .map(|c| c.data)
            .filter(|p| p.created_utc >= cutoff && !p.title.trim().is_empty())
            .collect();

        let mentions = recent.len();
        let sentiment = if recent.is_empty() {
            None
        } else {
            let sum: f64 = recent.iter().map(|p| lexicon_score(&p.title)).sum();
            Some(sum / mentions as f64)
        };

        recent.sort_by(|a, b| (b.score + b.num_comments).cmp(&(a.score + a.num_comments)));
        let samples = recent
            .into_iter()
            .take(MAX_SAMPLES)
            .map(|p| TopSample {
                source: "reddit".to_string(),
                text: p.title,
                url: p.permalink.map(|link| format!("https://reddit.com{link}")),
                engagement: (p.score + p.num_comments).max(0),
            })
            .collect();

        let window_mins = (window_secs / 60.0).max(1.0);
        RawSignal {
            keyword: keyword.to_string(),
            source: "reddit".to_string(),
            mention_count: i64::try_from(mentions).unwrap_or(i64::MAX),
            velocity: mentions as f64 / window_mins,
            samples,
            sentiment,
        }
    }
}

#[async_trait]
impl SignalSource for RedditSource {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn fetch(&self, keywords: &[WatchKeyword]) -> Result<Vec<RawSignal>, SignalError> {
        let mut signals = Vec::with_capacity(keywords.len());
        let mut last_error = None;

        for keyword in keywords {
            match self.search(&keyword.keyword).await {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    tracing::warn!(keyword = %keyword.keyword, error = %e, "reddit search failed");
                    last_error = Some(e);
                }
            }
        }

        // A total outage is a source failure; partial results are kept.
        match last_error {
            Some(e) if signals.is_empty() && !keywords.is_empty() => Err(e),
            _ => Ok(signals),
        }
    }
}
