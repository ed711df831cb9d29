//! Comment Pipeline
//!
//! Turns each monitored post into one reply: admission, generation,
//! publishing, and rollback when publishing fails.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::post::{comment_context, Post};
use crate::metrics;
use crate::rate_limit::{AdmissionController, AdmissionError, AdmissionTicket};

/// Reply used when the generator fails
pub const DEFAULT_FALLBACK_COMMENT: &str = "That's interesting! Thanks for sharing.";

/// Produces comment text for a post context
#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(&self, context: &str) -> Result<String>;
}

/// Publishes a reply under a post
#[async_trait]
pub trait CommentPublisher: Send + Sync {
    async fn publish(&self, post: &Post, comment: &str) -> Result<()>;
}

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No channel ids were configured
    #[error("No channels to monitor; set TARGET_CHANNEL or bot.channels")]
    NoMonitoredChannels,

    /// Admission ended without a slot; nothing was attempted
    #[error("Admission failed: {0}")]
    Admission(#[from] AdmissionError),
}

/// Set of monitored channel ids
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    channels: HashSet<String>,
}

impl ChannelFilter {
    /// Build from raw ids; blank entries are skipped
    pub fn new<I, S>(channels: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let channels: HashSet<String> = channels
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if channels.is_empty() {
            return Err(PipelineError::NoMonitoredChannels);
        }
        Ok(Self { channels })
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.channels.contains(channel_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// What happened to a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Post came from a channel that is not monitored
    Ignored,

    /// Reply was published
    Published {
        ticket: AdmissionTicket,
        comment: String,
        used_fallback: bool,
    },

    /// Publishing failed and the admission was rolled back
    PublishFailed { error: String },
}

/// Comment pipeline
pub struct CommentPipeline {
    filter: ChannelFilter,
    limiter: Arc<AdmissionController>,
    generator: Arc<dyn CommentGenerator>,
    publisher: Arc<dyn CommentPublisher>,
    fallback_comment: String,
}

impl CommentPipeline {
    /// Create a new pipeline
    pub fn new(
        filter: ChannelFilter,
        limiter: Arc<AdmissionController>,
        generator: Arc<dyn CommentGenerator>,
        publisher: Arc<dyn CommentPublisher>,
    ) -> Self {
        Self {
            filter,
            limiter,
            generator,
            publisher,
            fallback_comment: DEFAULT_FALLBACK_COMMENT.to_string(),
        }
    }

    /// Replace the reply used when generation fails
    pub fn with_fallback_comment(mut self, comment: impl Into<String>) -> Self {
        self.fallback_comment = comment.into();
        self
    }

    /// Shared admission controller
    pub fn limiter(&self) -> &Arc<AdmissionController> {
        &self.limiter
    }

    /// Process one post
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Admission`] when admission was cancelled or
    /// timed out. No reply was attempted, so nothing is rolled back.
    pub async fn handle_post(&self, post: &Post) -> Result<PostOutcome, PipelineError> {
        if !self.filter.contains(&post.channel_id) {
            debug!(channel_id = %post.channel_id, "Post from unmonitored channel, ignoring");
            metrics::COMMENTS_TOTAL.with_label_values(&["ignored"]).inc();
            return Ok(PostOutcome::Ignored);
        }

        info!(
            channel_id = %post.channel_id,
            message_id = post.message_id,
            preview = %post.preview(50),
            "New post detected"
        );

        let admission = self.limiter.request_admission().await.map_err(|e| {
            warn!(error = %e, message_id = post.message_id, "Post skipped, no admission");
            metrics::COMMENTS_TOTAL.with_label_values(&["skipped"]).inc();
            e
        })?;

        let context = comment_context(post);
        let (comment, used_fallback) = match self.generator.generate(&context).await {
            Ok(comment) => (comment, false),
            Err(e) => {
                error!(error = %e, "Comment generation failed, using fallback");
                metrics::COMMENTS_TOTAL.with_label_values(&["fallback"]).inc();
                (self.fallback_comment.clone(), true)
            }
        };
        debug!(comment = %comment, "Generated comment");

        match self.publisher.publish(post, &comment).await {
            Ok(()) => {
                info!(message_id = post.message_id, ticket = %admission.ticket, "Comment posted successfully");
                metrics::COMMENTS_TOTAL.with_label_values(&["published"]).inc();
                Ok(PostOutcome::Published {
                    ticket: admission.ticket,
                    comment,
                    used_fallback,
                })
            }
            Err(e) => {
                error!(error = %e, message_id = post.message_id, "Error posting comment");
                // A failed reply must not count against the limits
                self.limiter.rollback(admission.ticket).await;
                metrics::COMMENTS_TOTAL.with_label_values(&["failed"]).inc();
                Ok(PostOutcome::PublishFailed {
                    error: e.to_string(),
                })
            }
        }
    }
}
