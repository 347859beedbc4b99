//! Sends scheduled posts and records the result.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use trendcast_core::{Platform, Post, PostStatus};
use trendcast_db::Repository;

use crate::error::PublishError;
use crate::senders::{PlatformSender, SendOutcome};

/// Result of one publish attempt. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    /// `None` when the attempt failed before a post was stored.
    pub post_id: Option<i64>,
    pub platform: Option<Platform>,
    pub success: bool,
    pub external_post_id: Option<String>,
    pub error: Option<String>,
}

impl PublishOutcome {
    fn failed(post_id: i64, platform: Option<Platform>, error: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id),
            platform,
            success: false,
            external_post_id: None,
            error: Some(error.into()),
        }
    }

    /// A platform whose post could not be stored or scheduled.
    #[must_use]
    pub fn not_created(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            post_id: None,
            platform: Some(platform),
            success: false,
            external_post_id: None,
            error: Some(error.into()),
        }
    }
}

/// Post ids currently being sent by this publisher.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<i64>>);

impl InFlight {
    fn claim(this: &Arc<Self>, post_id: i64) -> Option<Claim> {
        let inserted = this
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(post_id);
        inserted.then(|| Claim {
            post_id,
            owner: Arc::clone(this),
        })
    }
}

/// Releases the post id when the publish attempt ends.
struct Claim {
    post_id: i64,
    owner: Arc<InFlight>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.owner
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.post_id);
    }
}

pub struct Publisher {
    repo: Arc<dyn Repository>,
    senders: BTreeMap<Platform, Arc<dyn PlatformSender>>,
    timeout: Duration,
    in_flight: Arc<InFlight>,
}

impl Publisher {
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, timeout: Duration) -> Self {
        Self {
            repo,
            senders: BTreeMap::new(),
            timeout,
            in_flight: Arc::default(),
        }
    }

    /// Register `sender` for its platform, replacing any previous one.
    #[must_use]
    pub fn with_sender(mut self, sender: Arc<dyn PlatformSender>) -> Self {
        self.senders.insert(sender.platform(), sender);
        self
    }

    #[must_use]
    pub fn with_senders(self, senders: impl IntoIterator<Item = Arc<dyn PlatformSender>>) -> Self {
        senders.into_iter().fold(self, Publisher::with_sender)
    }

    #[must_use]
    pub fn sender(&self, platform: Platform) -> Option<&Arc<dyn PlatformSender>> {
        self.senders.get(&platform)
    }

    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        self.senders.keys().copied().collect()
    }

    /// Send a scheduled post and record the result.
    ///
    /// Exactly one send is attempted. Any failure (platform refusal, error,
    /// timeout, or no sender for the platform) marks the post failed with
    /// the message as reported.
    ///
    /// The post is claimed before its status is read, so overlapping calls
    /// for the same post send it at most once; the loser gets a failed
    /// outcome and the post is left alone.
    pub async fn publish(&self, post_id: i64) -> PublishOutcome {
        let Some(_claim) = InFlight::claim(&self.in_flight, post_id) else {
            tracing::warn!(post_id, "publish skipped; post is already being sent");
            return PublishOutcome::failed(
                post_id,
                None,
                format!("post {post_id} is already being published"),
            );
        };
        let post = match self.repo.get_post(post_id).await {
            Ok(post) => post,
            Err(e) => return PublishOutcome::failed(post_id, None, e.to_string()),
        };
        if post.status != PostStatus::Scheduled {
            return PublishOutcome::failed(
                post_id,
                Some(post.platform),
                format!("post {post_id} is {}, expected scheduled", post.status),
            );
        }

        let sent = match self.sender(post.platform) {
            Some(sender) => self.send(sender.as_ref(), &post).await,
            None => Err(PublishError::NoSender(post.platform).to_string()),
        };

        match sent {
            Ok(external_id) => self.record_success(&post, external_id).await,
            Err(message) => self.record_failure(&post, message).await,
        }
    }

    /// Publish every post in turn. A failure never stops the batch.
    pub async fn publish_batch(&self, post_ids: &[i64]) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::with_capacity(post_ids.len());
        for &post_id in post_ids {
            outcomes.push(self.publish(post_id).await);
        }
        let failed = outcomes.iter().filter(|o| !o.success).count();
        tracing::info!(total = outcomes.len(), failed, "publish batch complete");
        outcomes
    }

    /// The external id on success, or the failure message.
    async fn send(&self, sender: &dyn PlatformSender, post: &Post) -> Result<String, String> {
        let attempt = async {
            match post.image_path.as_deref() {
                Some(image) => sender.send_photo(image, &post.caption).await,
                None => sender.send_text(&post.caption).await,
            }
        };
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(SendOutcome {
                success: true,
                external_id: Some(id),
                ..
            })) => Ok(id),
            Ok(Ok(SendOutcome {
                success: true,
                external_id: None,
                ..
            })) => Err("platform reported success without a post id".to_string()),
            Ok(Ok(outcome)) => Err(outcome.error.unwrap_or_else(|| "Unknown error".to_string())),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("send timed out after {:?}", self.timeout)),
        }
    }

    async fn record_success(&self, post: &Post, external_id: String) -> PublishOutcome {
        match self
            .repo
            .mark_post_posted(post.id, Utc::now(), &external_id)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    post_id = post.id,
                    platform = %post.platform,
                    external_id = %external_id,
                    "post published"
                );
                PublishOutcome {
                    post_id: Some(post.id),
                    platform: Some(post.platform),
                    success: true,
                    external_post_id: Some(external_id),
                    error: None,
                }
            }
            Err(e) => {
                // The platform has the post; only our record is missing.
                tracing::error!(
                    post_id = post.id,
                    external_id = %external_id,
                    error = %e,
                    "post sent but recording it failed"
                );
                PublishOutcome {
                    post_id: Some(post.id),
                    platform: Some(post.platform),
                    success: false,
                    external_post_id: Some(external_id),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn record_failure(&self, post: &Post, message: String) -> PublishOutcome {
        tracing::warn!(
            post_id = post.id,
            platform = %post.platform,
            error = %message,
            "post failed"
        );
        if let Err(e) = self.repo.mark_post_failed(post.id, &message).await {
            tracing::error!(post_id = post.id, error = %e, "failed to record post failure");
        }
        PublishOutcome::failed(post.id, Some(post.platform), message)
    }
}

#[cfg(test)]
#[path = "publisher_test.rs"]
mod tests;
