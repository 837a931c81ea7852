//! Candidate -> Post -> message payload.

use crate::domain::{Candidate, Post};

/// Base URL that relative permalinks are resolved against.
pub const REDDIT_BASE_URL: &str = "https://www.reddit.com";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Normalize a raw candidate. Never fails: a missing url becomes an empty image url.
///
/// The url is not checked to be an image; gallery, self and link posts pass through as-is.
pub fn to_post(candidate: &Candidate) -> Post {
    let permalink = if candidate.permalink.starts_with("http") {
        candidate.permalink.clone()
    } else {
        format!("{REDDIT_BASE_URL}{}", candidate.permalink)
    };

    Post {
        id: candidate.id.clone(),
        title: candidate.title.clone(),
        image_url: candidate.url.clone().unwrap_or_default(),
        permalink,
    }
}

/// Displayable payload for a post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostMessage {
    pub title: String,
    pub description: String,
    /// Attached only when the post has a non-empty image url.
    pub image_url: Option<String>,
}

impl PostMessage {
    pub fn from_post(post: &Post) -> Self {
        let image_url = if post.image_url.trim().is_empty() {
            None
        } else {
            Some(post.image_url.clone())
        };
        Self {
            title: post.title.clone(),
            description: post.permalink.clone(),
            image_url,
        }
    }

    /// Telegram HTML body: bold title, then the link to the thread.
    pub fn to_html(&self) -> String {
        format!(
            "<b>{}</b>\n{}",
            escape_html(&self.title),
            escape_html(&self.description)
        )
    }
}

impl From<&Post> for PostMessage {
    fn from(post: &Post) -> Self {
        Self::from_post(post)
    }
}
