//! The pipeline facade: every operation the API and CLI expose.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use trendcast_content::{caption_for_news, generate_candidates, OllamaClient, TextGenerator};
use trendcast_core::{
    AppConfig, CandidateEdit, CandidateStatus, ContentCandidate, ContentStats, NewPost, Platform,
    Post, PostStatus, PublishSchedule, Trend, Watchlist,
};
use trendcast_db::Repository;
use trendcast_publish::{configured_senders, PlatformSender, PublishOutcome, Publisher};
use trendcast_signals::{
    detect_trends, predict_viral, should_create_content, ArticleInput, DetectionPolicy,
    DetectionReport, NewsFeedSource, RedditSource, SignalSource, ViralPrediction,
};

use crate::error::PipelineError;

/// Largest batch a single generate call may ask for.
pub const MAX_CANDIDATES_PER_CALL: usize = 12;
const DAILY_PLAN_BATCH: usize = 6;
const ANALYTICS_LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct CollectSummary {
    pub detection: DetectionReport,
    pub news_inserted: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoPostSummary {
    pub due: Vec<PublishOutcome>,
    /// Set when nothing was due and a news item was posted instead.
    pub fallback: Option<PublishOutcome>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AnalyticsSummary {
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyPlanSummary {
    /// `(trend_id, candidates generated)` for each planned trend.
    pub planned: Vec<(i64, usize)>,
    pub failed: Vec<(i64, String)>,
}

pub struct Pipeline {
    repo: Arc<dyn Repository>,
    sources: Vec<Arc<dyn SignalSource>>,
    news: Option<NewsFeedSource>,
    text: Option<Arc<dyn TextGenerator>>,
    publisher: Publisher,
    watchlist: Watchlist,
    config: Arc<AppConfig>,
}

impl Pipeline {
    /// A pipeline with no sources, senders or text backend attached.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, watchlist: Watchlist, config: Arc<AppConfig>) -> Self {
        let publisher = Publisher::new(
            Arc::clone(&repo),
            Duration::from_secs(config.sender_timeout_secs),
        );
        Self {
            repo,
            sources: Vec::new(),
            news: None,
            text: None,
            publisher,
            watchlist,
            config,
        }
    }

    /// Wire every adapter the configuration enables: Reddit and the
    /// watchlist's news feeds, the Ollama backend when `OLLAMA_URL` is set,
    /// and a sender for each platform with credentials.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if an adapter's HTTP client cannot be built.
    pub fn from_config(
        repo: Arc<dyn Repository>,
        watchlist: Watchlist,
        config: Arc<AppConfig>,
    ) -> Result<Self, PipelineError> {
        let reddit = RedditSource::new(
            &config.user_agent,
            config.collector_timeout_secs,
            watchlist.subreddits.clone(),
        )?;
        let news = NewsFeedSource::new(
            &config.user_agent,
            config.collector_timeout_secs,
            watchlist.news_feeds.clone(),
        )?;
        let senders = configured_senders(&config)?;

        let mut pipeline = Self::new(repo, watchlist, Arc::clone(&config))
            .with_source(Arc::new(reddit))
            .with_news(news)
            .with_senders(senders);
        if let Some(url) = &config.ollama_url {
            let ollama = OllamaClient::new(url, &config.ollama_model, config.text_gen_timeout_secs)?;
            pipeline = pipeline.with_text_generator(Arc::new(ollama));
        }
        tracing::info!(
            sources = pipeline.sources.len(),
            platforms = ?pipeline.publisher.platforms(),
            text_generator = pipeline.text.is_some(),
            "pipeline configured"
        );
        Ok(pipeline)
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn SignalSource>) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn with_news(mut self, news: NewsFeedSource) -> Self {
        self.news = Some(news);
        self
    }

    #[must_use]
    pub fn with_text_generator(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = Some(text);
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender: Arc<dyn PlatformSender>) -> Self {
        self.publisher = self.publisher.with_sender(sender);
        self
    }

    #[must_use]
    pub fn with_senders(mut self, senders: Vec<Arc<dyn PlatformSender>>) -> Self {
        self.publisher = self.publisher.with_senders(senders);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    // --- trends -----------------------------------------------------------

    /// Run one detection pass now.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the trend sweep cannot read or
    /// write the store.
    pub async fn trigger_detection(&self) -> Result<DetectionReport, PipelineError> {
        self.detect_at(Utc::now()).await
    }

    async fn detect_at(&self, now: DateTime<Utc>) -> Result<DetectionReport, PipelineError> {
        let policy = DetectionPolicy::from_app_config(&self.config);
        Ok(detect_trends(self.repo.as_ref(), &self.sources, &self.watchlist, &policy, now).await?)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] on a store failure.
    pub async fn list_trends(&self) -> Result<Vec<Trend>, PipelineError> {
        Ok(self.repo.list_active_trends().await?)
    }

    /// Score an article headline for its viral potential at the current local hour.
    #[must_use]
    pub fn predict_viral(
        &self,
        title: &str,
        description: &str,
        source: &str,
        category: &str,
    ) -> ViralPrediction {
        let local_hour = Utc::now().with_timezone(&self.config.local_offset()).hour();
        predict_viral(
            &ArticleInput {
                title,
                description,
                source,
                category,
            },
            local_hour,
            &self.watchlist,
        )
    }

    // --- candidates -------------------------------------------------------

    /// Generate and store up to `count` candidates for a trend.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if `count` is zero or above
    /// [`MAX_CANDIDATES_PER_CALL`], [`PipelineError::NotFound`] for an
    /// unknown trend.
    pub async fn generate_candidates(
        &self,
        trend_id: i64,
        count: usize,
    ) -> Result<Vec<ContentCandidate>, PipelineError> {
        if count == 0 || count > MAX_CANDIDATES_PER_CALL {
            return Err(PipelineError::Validation(format!(
                "count must be between 1 and {MAX_CANDIDATES_PER_CALL}, got {count}"
            )));
        }
        let trend = self.repo.get_trend(trend_id).await?;
        Ok(generate_candidates(
            self.repo.as_ref(),
            &trend,
            count,
            Utc::now(),
            self.config.local_offset(),
        )
        .await?)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown trend.
    pub async fn list_candidates(
        &self,
        trend_id: i64,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<ContentCandidate>, PipelineError> {
        self.repo.get_trend(trend_id).await?;
        Ok(self.repo.list_candidates(trend_id, status).await?)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown candidate and
    /// [`PipelineError::Validation`] unless the candidate is suggested.
    pub async fn approve(&self, candidate_id: i64) -> Result<ContentCandidate, PipelineError> {
        let candidate = self
            .repo
            .set_candidate_status(candidate_id, CandidateStatus::Approved)
            .await?;
        tracing::info!(candidate_id, "candidate approved");
        Ok(candidate)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown candidate and
    /// [`PipelineError::Validation`] unless the candidate is suggested or approved.
    pub async fn reject(&self, candidate_id: i64) -> Result<ContentCandidate, PipelineError> {
        let candidate = self
            .repo
            .set_candidate_status(candidate_id, CandidateStatus::Rejected)
            .await?;
        tracing::info!(candidate_id, "candidate rejected");
        Ok(candidate)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for an empty edit, a blank
    /// title or body, or a published or rejected candidate.
    pub async fn edit_candidate(
        &self,
        candidate_id: i64,
        edit: &CandidateEdit,
    ) -> Result<ContentCandidate, PipelineError> {
        if edit.is_empty() {
            return Err(PipelineError::Validation("edit changes nothing".to_string()));
        }
        let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&edit.title) || blank(&edit.body) {
            return Err(PipelineError::Validation(
                "title and body cannot be blank".to_string(),
            ));
        }
        Ok(self.repo.edit_candidate(candidate_id, edit).await?)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] on a store failure.
    pub async fn content_stats(&self) -> Result<ContentStats, PipelineError> {
        Ok(self.repo.content_stats().await?)
    }

    // --- publishing -------------------------------------------------------

    /// Publish an approved candidate on each platform right away.
    ///
    /// With no platforms given, the configured default platform is used.
    /// Each platform gets its own post. A platform whose post cannot be
    /// created (for example one that already has a pending schedule) or
    /// whose send fails is reported in the returned outcomes; the others
    /// still go out.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown candidate or
    /// [`PipelineError::Validation`] if it has not been approved.
    pub async fn publish_now(
        &self,
        candidate_id: i64,
        platforms: &[Platform],
    ) -> Result<Vec<PublishOutcome>, PipelineError> {
        let candidate = self.publishable_candidate(candidate_id).await?;
        let platforms = if platforms.is_empty() {
            vec![self.config.default_platform]
        } else {
            platforms.to_vec()
        };

        let mut outcomes = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let created = self
                .repo
                .create_scheduled_post(&post_for(&candidate, platform), Utc::now())
                .await;
            let outcome = match created {
                Ok((post, _)) => self.publisher.publish(post.id).await,
                Err(e) => {
                    tracing::warn!(
                        candidate_id,
                        platform = %platform,
                        error = %e,
                        "publish now: post not created"
                    );
                    PublishOutcome::not_created(platform, PipelineError::from(e).to_string())
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Schedule an approved candidate on `platform`.
    ///
    /// `at` falls back to the candidate's suggested posting time.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if no time is available or the
    /// candidate has not been approved, [`PipelineError::Conflict`] if the
    /// platform already has a pending schedule for it.
    pub async fn schedule(
        &self,
        candidate_id: i64,
        platform: Platform,
        at: Option<DateTime<Utc>>,
    ) -> Result<PublishSchedule, PipelineError> {
        let candidate = self.publishable_candidate(candidate_id).await?;
        let Some(at) = at.or(candidate.best_time_to_post) else {
            return Err(PipelineError::Validation(format!(
                "candidate {candidate_id} has no suggested posting time; give one explicitly"
            )));
        };
        let (post, schedule) = self
            .repo
            .create_scheduled_post(&post_for(&candidate, platform), at)
            .await?;
        tracing::info!(
            candidate_id,
            post_id = post.id,
            platform = %platform,
            at = %at,
            "candidate scheduled"
        );
        Ok(schedule)
    }

    /// Schedule an existing draft post, such as a retry or an unscheduled
    /// attempt. `at` defaults to now, which the next auto-post run picks up.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown post,
    /// [`PipelineError::Validation`] unless it is a draft, or
    /// [`PipelineError::Conflict`] if its candidate already has a pending
    /// schedule on the same platform.
    pub async fn schedule_post(
        &self,
        post_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<PublishSchedule, PipelineError> {
        let at = at.unwrap_or_else(Utc::now);
        let schedule = self.repo.schedule_post(post_id, at).await?;
        tracing::info!(post_id, at = %at, "post scheduled");
        Ok(schedule)
    }

    async fn publishable_candidate(
        &self,
        candidate_id: i64,
    ) -> Result<ContentCandidate, PipelineError> {
        let candidate = self.repo.get_candidate(candidate_id).await?;
        match candidate.status {
            CandidateStatus::Approved | CandidateStatus::Scheduled | CandidateStatus::Published => {
                Ok(candidate)
            }
            other => Err(PipelineError::Validation(format!(
                "candidate {candidate_id} is {other}; approve it before publishing"
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] unless the post is scheduled.
    pub async fn unschedule(&self, post_id: i64) -> Result<Post, PipelineError> {
        Ok(self.repo.unschedule_post(post_id).await?)
    }

    /// Create a fresh draft attempt for a failed post.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] unless the post failed.
    pub async fn retry(&self, post_id: i64) -> Result<Post, PipelineError> {
        let failed = self.repo.get_post(post_id).await?;
        if failed.status != PostStatus::Failed {
            return Err(PipelineError::Validation(format!(
                "post {post_id} is {}; only failed posts can be retried",
                failed.status
            )));
        }
        let retry = self.repo.create_post(&NewPost::retry_of(&failed)).await?;
        tracing::info!(post_id, retry_id = retry.id, attempt = retry.attempt, "retry created");
        Ok(retry)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the store is unreachable.
    pub async fn health(&self) -> Result<(), PipelineError> {
        Ok(self.repo.health_check().await?)
    }

    // --- jobs -------------------------------------------------------------

    /// Detect trends and pull news feeds into the posting queue.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the trend sweep fails.
    pub async fn collect_signals(&self, now: DateTime<Utc>) -> Result<CollectSummary, PipelineError> {
        let detection = self.detect_at(now).await?;

        let mut news_inserted = 0;
        if let Some(news) = &self.news {
            let items = news.fetch_all().await;
            if !items.is_empty() {
                match self.repo.insert_news_items(&items).await {
                    Ok(n) => news_inserted = n,
                    Err(e) => tracing::warn!(error = %e, "storing news items failed"),
                }
            }
        }

        Ok(CollectSummary {
            detection,
            news_inserted,
        })
    }

    /// Publish every post due around `now`, falling back to a news item
    /// when nothing is due.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the due posts cannot be listed.
    pub async fn auto_post(&self, now: DateTime<Utc>) -> Result<AutoPostSummary, PipelineError> {
        let window = chrono::Duration::minutes(self.config.auto_post_window_mins);
        let due: Vec<i64> = self
            .repo
            .list_due_posts(now - window, now + window)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if !due.is_empty() {
            return Ok(AutoPostSummary {
                due: self.publisher.publish_batch(&due).await,
                fallback: None,
            });
        }
        if !self.config.auto_post_fallback {
            tracing::info!("auto-post: nothing due");
            return Ok(AutoPostSummary::default());
        }

        let fallback = self.post_fresh_news(now).await?;
        Ok(AutoPostSummary {
            due: Vec::new(),
            fallback,
        })
    }

    async fn post_fresh_news(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<PublishOutcome>, PipelineError> {
        let Some(item) = self.repo.freshest_unused_news().await? else {
            tracing::info!("auto-post: nothing due and no unused news");
            return Ok(None);
        };

        let draft = caption_for_news(self.text.as_deref(), &item).await;
        let (post, _) = self
            .repo
            .create_scheduled_post(
                &NewPost {
                    candidate_id: None,
                    news_id: Some(item.id),
                    platform: self.config.default_platform,
                    title: item.title.clone(),
                    caption: draft.full_text(),
                    image_path: item.image_url.clone(),
                    attempt: 1,
                    retry_of: None,
                },
                now,
            )
            .await?;
        let outcome = self.publisher.publish(post.id).await;
        if let Err(e) = self.repo.mark_news_used(item.id).await {
            tracing::error!(news_id = item.id, error = %e, "auto-post: marking news used failed");
        }
        tracing::info!(
            news_id = item.id,
            post_id = post.id,
            success = outcome.success,
            "auto-post: posted news fallback"
        );
        Ok(Some(outcome))
    }

    /// Pull fresh metrics for posts published in the last week.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the posts cannot be listed.
    pub async fn refresh_analytics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsSummary, PipelineError> {
        let since = now - chrono::Duration::days(ANALYTICS_LOOKBACK_DAYS);
        let mut summary = AnalyticsSummary::default();

        for post in self.repo.list_posted_since(since).await? {
            let (Some(external_id), Some(sender)) =
                (post.external_post_id.as_deref(), self.publisher.sender(post.platform))
            else {
                summary.skipped += 1;
                continue;
            };
            match sender.fetch_metrics(external_id).await {
                Ok(Some(metrics)) => match self.repo.record_post_metrics(post.id, &metrics).await {
                    Ok(()) => summary.refreshed += 1,
                    Err(e) => {
                        tracing::warn!(post_id = post.id, error = %e, "storing metrics failed");
                        summary.failed += 1;
                    }
                },
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    tracing::warn!(post_id = post.id, error = %e, "fetching metrics failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Generate a candidate batch for the day's hottest trends that have
    /// nothing awaiting review.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the active trends cannot be listed.
    pub async fn daily_plan(&self, now: DateTime<Utc>) -> Result<DailyPlanSummary, PipelineError> {
        let mut summary = DailyPlanSummary::default();
        let mut remaining = self.config.posts_per_day;

        for trend in self.repo.list_active_trends().await? {
            if remaining == 0 {
                break;
            }
            if !should_create_content(&trend) {
                continue;
            }
            match self
                .repo
                .list_candidates(trend.id, Some(CandidateStatus::Suggested))
                .await
            {
                Ok(pending) if !pending.is_empty() => continue,
                Ok(_) => {}
                Err(e) => {
                    summary.failed.push((trend.id, e.to_string()));
                    continue;
                }
            }

            remaining -= 1;
            match generate_candidates(
                self.repo.as_ref(),
                &trend,
                DAILY_PLAN_BATCH,
                now,
                self.config.local_offset(),
            )
            .await
            {
                Ok(created) => summary.planned.push((trend.id, created.len())),
                Err(e) => {
                    tracing::warn!(trend_id = trend.id, error = %e, "daily plan generation failed");
                    summary.failed.push((trend.id, e.to_string()));
                }
            }
        }
        Ok(summary)
    }
}

fn post_for(candidate: &ContentCandidate, platform: Platform) -> NewPost {
    let caption = if candidate.hashtags.is_empty() {
        candidate.body.clone()
    } else {
        format!("{}\n\n{}", candidate.body, candidate.hashtags.join(" "))
    };
    NewPost {
        candidate_id: Some(candidate.id),
        news_id: None,
        platform,
        title: candidate.title.clone(),
        caption,
        image_path: None,
        attempt: 1,
        retry_of: None,
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
