//! Caption writing through a local text model, with a template fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use trendcast_core::NewsItem;

use crate::error::ContentError;

const NEWS_HASHTAGS: &[&str] = &["#Football", "#FootballNews", "#Soccer"];
const MEME_TOP_CHARS: usize = 50;

/// A backend that turns a prompt into raw model output.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ContentError>;
}

/// Client for an Ollama server's `/api/generate` endpoint.
pub struct OllamaClient {
    client: Client,
    base_url: Url,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// # Errors
    ///
    /// Returns [`ContentError::Http`] if the HTTP client cannot be built, or
    /// [`ContentError::BaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ContentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ContentError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
            timeout_secs,
        })
    }

    fn classify(&self, e: reqwest::Error) -> ContentError {
        if e.is_timeout() {
            ContentError::Timeout(self.timeout_secs)
        } else {
            ContentError::Http(e)
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, ContentError> {
        let url = self
            .base_url
            .join("api/generate")
            .map_err(|e| ContentError::BaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()?;
        let body = response.text().await.map_err(|e| self.classify(e))?;

        let decoded: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ContentError::Malformed(format!("ollama response: {e}")))?;
        Ok(decoded.response)
    }
}

/// Post text produced for a news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionDraft {
    pub caption: String,
    #[serde(default)]
    pub meme_text_top: Option<String>,
    #[serde(default)]
    pub meme_text_bottom: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl CaptionDraft {
    /// Caption followed by its hashtags, as posted.
    #[must_use]
    pub fn full_text(&self) -> String {
        if self.hashtags.is_empty() {
            self.caption.clone()
        } else {
            format!("{}\n\n{}", self.caption, self.hashtags.join(" "))
        }
    }
}

/// Decode model output into a [`CaptionDraft`].
///
/// # Errors
///
/// Returns [`ContentError::Malformed`] if `raw` is not a JSON object of the
/// expected shape or the caption is blank.
pub fn decode_caption(raw: &str) -> Result<CaptionDraft, ContentError> {
    let mut draft: CaptionDraft = serde_json::from_str(raw.trim())
        .map_err(|e| ContentError::Malformed(format!("caption json: {e}")))?;
    draft.caption = draft.caption.trim().to_string();
    if draft.caption.is_empty() {
        return Err(ContentError::Malformed("caption is empty".to_string()));
    }
    draft.hashtags = draft
        .hashtags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| if t.starts_with('#') { t } else { format!("#{t}") })
        .collect();
    Ok(draft)
}

fn news_prompt(item: &NewsItem) -> String {
    format!(
        "You write short, punchy football posts for a social media page.\n\
         Write a post about this news story.\n\n\
         Title: {}\nSummary: {}\nSource: {}\n\n\
         Reply with JSON only, using exactly these fields:\n\
         {{\"caption\": \"2-3 engaging sentences\", \
         \"meme_text_top\": \"short top line\", \
         \"meme_text_bottom\": \"short punchline\", \
         \"hashtags\": [\"#Football\", \"...\"]}}",
        item.title, item.description, item.source
    )
}

/// Deterministic caption built from the news item itself.
#[must_use]
pub fn fallback_caption(item: &NewsItem) -> CaptionDraft {
    let mut caption = format!("\u{26BD} {}", item.title.trim());
    let description = item.description.trim();
    if !description.is_empty() {
        caption.push_str("\n\n");
        caption.push_str(description);
    }
    caption = format!("{caption}\n\nSource: {}", item.source);

    CaptionDraft {
        caption,
        meme_text_top: Some(item.title.chars().take(MEME_TOP_CHARS).collect()),
        meme_text_bottom: None,
        hashtags: NEWS_HASHTAGS.iter().map(ToString::to_string).collect(),
    }
}

/// Write a caption for `item`, falling back to [`fallback_caption`] when no
/// generator is configured or its output is unusable.
pub async fn caption_for_news(
    generator: Option<&dyn TextGenerator>,
    item: &NewsItem,
) -> CaptionDraft {
    let Some(generator) = generator else {
        return fallback_caption(item);
    };

    match generator.generate(&news_prompt(item)).await {
        Ok(raw) => match decode_caption(&raw) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(news_id = item.id, error = %e, "unusable caption output, using template");
                fallback_caption(item)
            }
        },
        Err(e) => {
            tracing::warn!(news_id = item.id, error = %e, "text generation failed, using template");
            fallback_caption(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item() -> NewsItem {
        NewsItem {
            id: 3,
            title: "Arsenal complete late comeback against Chelsea at the Emirates".to_string(),
            description: "Two goals in the final ten minutes.".to_string(),
            url: "https://news.example/arsenal".to_string(),
            source: "BBC Sport".to_string(),
            image_url: None,
            published_at: None,
            is_used: false,
            created_at: Utc::now(),
        }
    }

    struct Canned(Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _: &str) -> Result<String, ContentError> {
            self.0
                .map(ToString::to_string)
                .map_err(|()| ContentError::Timeout(60))
        }
    }

    #[test]
    fn decode_accepts_the_expected_shape() {
        let draft = decode_caption(
            r##"{"caption":" What a night! ","meme_text_top":"ME","hashtags":["Arsenal","#COYG"," "]}"##,
        )
        .expect("valid caption");
        assert_eq!(draft.caption, "What a night!");
        assert_eq!(draft.meme_text_top.as_deref(), Some("ME"));
        assert_eq!(draft.meme_text_bottom, None);
        assert_eq!(draft.hashtags, vec!["#Arsenal", "#COYG"]);
    }

    #[test]
    fn decode_rejects_blank_or_foreign_output() {
        assert!(matches!(
            decode_caption(r#"{"caption":"   "}"#),
            Err(ContentError::Malformed(_))
        ));
        assert!(matches!(
            decode_caption("Sure! Here is your caption:"),
            Err(ContentError::Malformed(_))
        ));
        assert!(matches!(
            decode_caption(r#"{"text":"no caption field"}"#),
            Err(ContentError::Malformed(_))
        ));
    }

    #[test]
    fn fallback_is_deterministic() {
        let draft = fallback_caption(&item());
        assert_eq!(draft, fallback_caption(&item()));
        assert!(draft.caption.starts_with("\u{26BD} Arsenal complete"));
        assert!(draft.caption.ends_with("Source: BBC Sport"));
        assert_eq!(draft.meme_text_top.as_deref().map(str::len), Some(50));
    }

    #[tokio::test]
    async fn model_output_is_used_when_valid() {
        let generator = Canned(Ok(r##"{"caption":"Comeback kings!","hashtags":["#Arsenal"]}"##));
        let draft = caption_for_news(Some(&generator), &item()).await;
        assert_eq!(draft.caption, "Comeback kings!");
        assert_eq!(draft.full_text(), "Comeback kings!\n\n#Arsenal");
    }

    #[tokio::test]
    async fn falls_back_on_error_malformed_output_or_no_backend() {
        let expected = fallback_caption(&item());
        assert_eq!(caption_for_news(Some(&Canned(Err(()))), &item()).await, expected);
        assert_eq!(
            caption_for_news(Some(&Canned(Ok("not json"))), &item()).await,
            expected
        );
        assert_eq!(caption_for_news(None, &item()).await, expected);
    }
}
