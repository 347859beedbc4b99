//! Posting to X through the v2 API with a user-context bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use trendcast_core::{ContentMetrics, Platform};

use super::{is_remote, parse_base_url, read_image, PlatformSender, SendOutcome};
use crate::error::PublishError;

const DEFAULT_BASE_URL: &str = "https://api.x.com/";
const MAX_TWEET_CHARS: usize = 280;

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TweetMetrics {
    public_metrics: PublicMetrics,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    retweet_count: i64,
    #[serde(default)]
    reply_count: i64,
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    quote_count: i64,
    #[serde(default)]
    impression_count: i64,
}

impl<T> DataEnvelope<T> {
    /// The most specific error message in the payload.
    fn error_message(&self) -> Option<String> {
        self.detail
            .clone()
            .or_else(|| {
                self.errors
                    .iter()
                    .find_map(|e| e.message.clone().or_else(|| e.detail.clone()))
            })
            .or_else(|| self.title.clone())
    }
}

pub struct TwitterSender {
    client: Client,
    base_url: Url,
    bearer_token: String,
}

impl TwitterSender {
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the HTTP client cannot be built.
    pub fn new(bearer_token: &str, timeout_secs: u64) -> Result<Self, PublishError> {
        Self::with_base_url(bearer_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Sender with a custom API base URL (for wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the HTTP client cannot be built, or
    /// [`PublishError::BaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        bearer_token: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            bearer_token: bearer_token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PublishError> {
        self.base_url.join(path).map_err(|e| PublishError::BaseUrl {
            url: self.base_url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: Response,
        context: &Url,
    ) -> Result<(reqwest::StatusCode, DataEnvelope<T>), PublishError> {
        let status = response.status();
        let body = response.text().await?;
        let envelope = serde_json::from_str(&body).map_err(|source| PublishError::Deserialize {
            context: context.path().to_string(),
            source,
        })?;
        Ok((status, envelope))
    }

    async fn upload_media(&self, image: &str) -> Result<Result<String, String>, PublishError> {
        let (bytes, name) = if is_remote(image) {
            let bytes = self
                .client
                .get(image)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            (bytes.to_vec(), "image".to_string())
        } else {
            read_image(image).await?
        };

        let url = self.endpoint("2/media/upload")?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", Part::bytes(bytes).file_name(name));
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.bearer_token)
            .multipart(form)
            .send()
            .await?;
        let (status, envelope) = Self::decode::<Created>(response, &url).await?;
        Ok(match envelope.data {
            Some(media) if status.is_success() => Ok(media.id),
            _ => Err(envelope
                .error_message()
                .unwrap_or_else(|| format!("media upload failed with status {status}"))),
        })
    }

    async fn create_tweet(
        &self,
        text: &str,
        media_id: Option<&str>,
    ) -> Result<SendOutcome, PublishError> {
        let url = self.endpoint("2/tweets")?;
        let mut body = json!({ "text": truncate_tweet(text) });
        if let Some(id) = media_id {
            body["media"] = json!({ "media_ids": [id] });
        }
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        let (status, envelope) = Self::decode::<Created>(response, &url).await?;
        Ok(match envelope.data {
            Some(ref created) if status.is_success() => SendOutcome::posted(created.id.clone()),
            _ => SendOutcome::refused(
                envelope
                    .error_message()
                    .unwrap_or_else(|| format!("tweet rejected with status {status}")),
            ),
        })
    }
}

/// Fit `text` into a single tweet, marking the cut with an ellipsis.
#[must_use]
pub fn truncate_tweet(text: &str) -> String {
    if text.chars().count() <= MAX_TWEET_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_TWEET_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[async_trait]
impl PlatformSender for TwitterSender {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn send_text(&self, text: &str) -> Result<SendOutcome, PublishError> {
        self.create_tweet(text, None).await
    }

    async fn send_photo(&self, image: &str, caption: &str) -> Result<SendOutcome, PublishError> {
        match self.upload_media(image).await? {
            Ok(media_id) => self.create_tweet(caption, Some(&media_id)).await,
            Err(message) => Ok(SendOutcome::refused(message)),
        }
    }

    async fn fetch_metrics(
        &self,
        external_id: &str,
    ) -> Result<Option<ContentMetrics>, PublishError> {
        let mut url = self.endpoint(&format!("2/tweets/{external_id}"))?;
        url.query_pairs_mut()
            .append_pair("tweet.fields", "public_metrics");
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let (status, envelope) = Self::decode::<TweetMetrics>(response, &url).await?;
        match envelope.data {
            Some(tweet) if status.is_success() => {
                let m = tweet.public_metrics;
                Ok(Some(ContentMetrics::from_counts(
                    m.impression_count,
                    m.like_count,
                    m.retweet_count + m.quote_count,
                    m.reply_count,
                )))
            }
            _ => Err(PublishError::Api {
                platform: Platform::Twitter,
                message: envelope
                    .error_message()
                    .unwrap_or_else(|| format!("status {status}")),
            }),
        }
    }
}
