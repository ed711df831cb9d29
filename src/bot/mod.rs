//! Channel Commenter
//!
//! Wiring between incoming channel posts and the admission controller.
//! Text generation and message delivery stay behind the
//! [`CommentGenerator`] and [`CommentPublisher`] traits.

pub mod console;
pub mod pipeline;
pub mod post;

pub use console::{run_posts, ConsolePublisher, RunSummary, TemplateGenerator};
pub use pipeline::{
    ChannelFilter, CommentGenerator, CommentPipeline, CommentPublisher, PipelineError, PostOutcome,
};
pub use post::{comment_context, describe_media, Post, PostMedia};
