//! Facebook page posting through the Graph API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use trendcast_core::{ContentMetrics, Platform};

use super::{is_remote, parse_base_url, read_image, PlatformSender, SendOutcome};
use crate::error::PublishError;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0/";
const INSIGHT_FIELDS: &str = "insights.metric(post_impressions,post_reactions_by_type_total),\
                              comments.summary(true),shares";

#[derive(Debug, Deserialize)]
struct GraphResponse {
    id: Option<String>,
    /// Set by `/photos`: the feed post wrapping the photo.
    post_id: Option<String>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct PostInsights {
    insights: Option<InsightList>,
    comments: Option<Summarised>,
    shares: Option<ShareCount>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct InsightList {
    #[serde(default)]
    data: Vec<Insight>,
}

#[derive(Debug, Deserialize)]
struct Insight {
    name: String,
    #[serde(default)]
    values: Vec<InsightValue>,
}

#[derive(Debug, Deserialize)]
struct InsightValue {
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Summarised {
    summary: Option<TotalCount>,
}

#[derive(Debug, Deserialize)]
struct TotalCount {
    #[serde(default)]
    total_count: i64,
}

#[derive(Debug, Deserialize)]
struct ShareCount {
    #[serde(default)]
    count: i64,
}

pub struct FacebookSender {
    client: Client,
    base_url: Url,
    page_id: String,
    access_token: String,
}

impl FacebookSender {
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the HTTP client cannot be built.
    pub fn new(page_id: &str, access_token: &str, timeout_secs: u64) -> Result<Self, PublishError> {
        Self::with_base_url(page_id, access_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Sender with a custom Graph API base URL (for wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the HTTP client cannot be built, or
    /// [`PublishError::BaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        page_id: &str,
        access_token: &str,
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
            page_id: page_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PublishError> {
        self.base_url.join(path).map_err(|e| PublishError::BaseUrl {
            url: self.base_url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        context: &Url,
    ) -> Result<T, PublishError> {
        // Graph reports failures as JSON bodies on 4xx, so the status is not checked.
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| PublishError::Deserialize {
            context: context.path().to_string(),
            source,
        })
    }

    fn outcome(response: GraphResponse) -> SendOutcome {
        if let Some(error) = response.error {
            return SendOutcome::refused(error.message);
        }
        match response.post_id.or(response.id) {
            Some(id) => SendOutcome::posted(id),
            None => SendOutcome::refused("Unknown error"),
        }
    }
}

#[async_trait]
impl PlatformSender for FacebookSender {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn send_text(&self, text: &str) -> Result<SendOutcome, PublishError> {
        let url = self.endpoint(&format!("{}/feed", self.page_id))?;
        let response = self
            .client
            .post(url.clone())
            .form(&[("message", text), ("access_token", self.access_token.as_str())])
            .send()
            .await?;
        Ok(Self::outcome(Self::decode(response, &url).await?))
    }

    async fn send_photo(&self, image: &str, caption: &str) -> Result<SendOutcome, PublishError> {
        let url = self.endpoint(&format!("{}/photos", self.page_id))?;
        let request = if is_remote(image) {
            self.client.post(url.clone()).form(&[
                ("url", image),
                ("message", caption),
                ("access_token", self.access_token.as_str()),
            ])
        } else {
            let (bytes, name) = read_image(image).await?;
            let form = Form::new()
                .text("message", caption.to_string())
                .text("access_token", self.access_token.clone())
                .part("source", Part::bytes(bytes).file_name(name));
            self.client.post(url.clone()).multipart(form)
        };
        let response = request.send().await?;
        Ok(Self::outcome(Self::decode(response, &url).await?))
    }

    async fn fetch_metrics(
        &self,
        external_id: &str,
    ) -> Result<Option<ContentMetrics>, PublishError> {
        let mut url = self.endpoint(external_id)?;
        url.query_pairs_mut()
            .append_pair("fields", INSIGHT_FIELDS)
            .append_pair("access_token", self.access_token.as_str());
        let response = self.client.get(url.clone()).send().await?;
        let insights: PostInsights = Self::decode(response, &url).await?;
        if let Some(error) = insights.error {
            return Err(PublishError::Api {
                platform: Platform::Facebook,
                message: error.message,
            });
        }
        Ok(Some(metrics_from_insights(&insights)))
    }
}

fn metrics_from_insights(insights: &PostInsights) -> ContentMetrics {
    let mut views = 0;
    let mut likes = 0;
    for insight in insights.insights.iter().flat_map(|list| &list.data) {
        let Some(value) = insight.values.first().map(|v| &v.value) else {
            continue;
        };
        match insight.name.as_str() {
            "post_impressions" => views = value.as_i64().unwrap_or(0),
            "post_reactions_by_type_total" => {
                likes = value
                    .as_object()
                    .map_or(0, |by_type| by_type.values().filter_map(serde_json::Value::as_i64).sum());
            }
            _ => {}
        }
    }
    let comments = insights
        .comments
        .as_ref()
        .and_then(|c| c.summary.as_ref())
        .map_or(0, |s| s.total_count);
    let shares = insights.shares.as_ref().map_or(0, |s| s.count);
    ContentMetrics::from_counts(views, likes, shares, comments)
}
