//! Channel posts and the text context handed to the comment generator

use serde::{Deserialize, Serialize};

/// Placeholder used when a post carries nothing to describe
pub const EMPTY_POST_PLACEHOLDER: &str = "[Post contains media without text]";

/// Media attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostMedia {
    Photo,
    Document {
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        is_video: bool,
    },
    Poll {
        question: String,
    },
    WebPage {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
    Other {
        kind: String,
    },
}

/// A new post observed in a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Channel the post was published in
    pub channel_id: String,

    /// Message id within the channel, used as the reply target
    pub message_id: i64,

    /// Message text
    #[serde(default)]
    pub text: Option<String>,

    /// Attached media
    #[serde(default)]
    pub media: Option<PostMedia>,
}

impl Post {
    /// First `max_chars` characters of the text, for log lines
    pub fn preview(&self, max_chars: usize) -> String {
        match &self.text {
            Some(text) if !text.is_empty() => text.chars().take(max_chars).collect(),
            _ => "[no text]".to_string(),
        }
    }
}

/// Short human-readable description of attached media
pub fn describe_media(media: &PostMedia) -> String {
    match media {
        PostMedia::Photo => "Photo".to_string(),
        PostMedia::Document { file_name, is_video } => {
            let name = file_name.as_deref().unwrap_or("document");
            if *is_video {
                format!("Video: {}", name)
            } else {
                format!("Document: {}", name)
            }
        }
        PostMedia::Poll { question } => format!("Poll: \"{}\"", question),
        PostMedia::WebPage { title, url } => match (title, url) {
            (Some(title), _) if !title.is_empty() => format!("Webpage: \"{}\"", title),
            (_, Some(url)) if !url.is_empty() => format!("Webpage: {}", url),
            _ => "Webpage".to_string(),
        },
        PostMedia::Other { kind } => format!("Media of type: {}", kind),
    }
}

/// Text the generator comments on: post text plus media descriptions
pub fn comment_context(post: &Post) -> String {
    let mut content = post.text.clone().unwrap_or_default();

    if let Some(media) = &post.media {
        content.push_str("\n\nMedia in post: ");
        content.push_str(&describe_media(media));
    }

    if content.trim().is_empty() {
        return EMPTY_POST_PLACEHOLDER.to_string();
    }
    content
}
