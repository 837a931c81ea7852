use async_trait::async_trait;

use crate::{
    domain::{ChannelId, Destination},
    formatting::PostMessage,
    Result,
};

/// Cross-messenger port.
///
/// The delivery loop fans out over `destinations()`; commands reply through the same
/// send methods.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Every destination the bot is currently connected to.
    async fn destinations(&self) -> Result<Vec<Destination>>;

    async fn send_post(&self, channel: ChannelId, post: &PostMessage) -> Result<()>;

    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<()>;
}
