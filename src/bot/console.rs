//! Console adapters for dry runs
//!
//! Posts arrive as JSON lines on a reader; replies are written as JSON lines
//! to a writer instead of being sent to the channel.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::pipeline::{CommentGenerator, CommentPipeline, CommentPublisher, PipelineError, PostOutcome};
use super::post::Post;
use crate::rate_limit::AdmissionError;

/// Default dry-run reply
pub const DEFAULT_REPLY_TEMPLATE: &str = "Thanks for sharing! ({preview})";

/// Generator that fills a fixed template
///
/// `{preview}` is replaced by the first 50 characters of the post context.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    template: String,
}

impl TemplateGenerator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_TEMPLATE)
    }
}

#[async_trait]
impl CommentGenerator for TemplateGenerator {
    async fn generate(&self, context: &str) -> Result<String> {
        let preview: String = context.chars().take(50).collect();
        Ok(self.template.replace("{preview}", &preview))
    }
}

#[derive(Debug, Serialize)]
struct ReplyLine<'a> {
    channel_id: &'a str,
    reply_to: i64,
    comment: &'a str,
}

/// Publisher that writes one JSON line per reply
pub struct ConsolePublisher<W> {
    writer: Mutex<W>,
}

impl<W> ConsolePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W> CommentPublisher for ConsolePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, post: &Post, comment: &str) -> Result<()> {
        let line = serde_json::to_string(&ReplyLine {
            channel_id: &post.channel_id,
            reply_to: post.message_id,
            comment,
        })?;

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub received: usize,
    pub ignored: usize,
    pub published: usize,
    pub failed: usize,
    pub malformed: usize,
    pub skipped: usize,
}

/// Feed posts from `reader` through the pipeline until EOF or shutdown
pub async fn run_posts<R>(
    reader: R,
    pipeline: &CommentPipeline,
    shutdown: CancellationToken,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = RunSummary::default();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read post stream")?,
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer reading posts");
                break;
            }
        };

        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let post: Post = match serde_json::from_str(&line) {
            Ok(post) => post,
            Err(e) => {
                warn!(error = %e, "Skipping malformed post line");
                summary.malformed += 1;
                continue;
            }
        };
        summary.received += 1;

        match pipeline.handle_post(&post).await {
            Ok(PostOutcome::Ignored) => summary.ignored += 1,
            Ok(PostOutcome::Published { .. }) => summary.published += 1,
            Ok(PostOutcome::PublishFailed { .. }) => summary.failed += 1,
            Err(PipelineError::Admission(AdmissionError::Cancelled)) => break,
            Err(PipelineError::Admission(AdmissionError::RateLimitTimeout { .. })) => {
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}
