//! Platform senders.

mod facebook;
mod twitter;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use trendcast_core::{AppConfig, ContentMetrics, Platform};

use crate::error::PublishError;

pub use facebook::FacebookSender;
pub use twitter::{truncate_tweet, TwitterSender};

/// What the platform said about a send.
///
/// A platform refusal (rate limit, policy rejection) is an outcome, not an
/// error: `success` is false and `error` carries the platform's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub external_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    #[must_use]
    pub fn posted(external_id: impl Into<String>) -> Self {
        Self {
            success: true,
            external_id: Some(external_id.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            external_id: None,
            error: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait PlatformSender: Send + Sync {
    fn platform(&self) -> Platform;

    async fn send_text(&self, text: &str) -> Result<SendOutcome, PublishError>;

    /// Post an image with a caption. `image` is a local path or an http(s) URL.
    async fn send_photo(&self, image: &str, caption: &str) -> Result<SendOutcome, PublishError>;

    /// Engagement figures for a post, when the platform exposes them.
    async fn fetch_metrics(
        &self,
        _external_id: &str,
    ) -> Result<Option<ContentMetrics>, PublishError> {
        Ok(None)
    }
}

/// Senders for every platform with credentials in `config`.
///
/// # Errors
///
/// Returns [`PublishError::Http`] if an HTTP client cannot be built.
pub fn configured_senders(
    config: &AppConfig,
) -> Result<Vec<Arc<dyn PlatformSender>>, PublishError> {
    let mut senders: Vec<Arc<dyn PlatformSender>> = Vec::new();
    if let (Some(page_id), Some(token)) =
        (&config.facebook_page_id, &config.facebook_access_token)
    {
        senders.push(Arc::new(FacebookSender::new(
            page_id,
            token,
            config.sender_timeout_secs,
        )?));
    }
    if let Some(token) = &config.x_bearer_token {
        senders.push(Arc::new(TwitterSender::new(token, config.sender_timeout_secs)?));
    }
    Ok(senders)
}

fn parse_base_url(base_url: &str) -> Result<Url, PublishError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| PublishError::BaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

fn is_remote(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://")
}

/// Bytes and file name of a local image.
async fn read_image(path: &str) -> Result<(Vec<u8>, String), PublishError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PublishError::Image {
            path: path.to_string(),
            source,
        })?;
    let name = std::path::Path::new(path)
        .file_name()
        .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());
    Ok((bytes, name))
}
