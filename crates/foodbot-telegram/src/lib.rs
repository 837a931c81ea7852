//! Telegram adapter (teloxide).
//!
//! This crate implements the `foodbot-core` MessagingPort over the Telegram Bot API and
//! wires chat updates into the command layer.

use std::sync::Arc;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use foodbot_core::{
    domain::{ChannelId, Destination},
    errors::Error,
    formatting::{escape_html, PostMessage},
    messaging::port::MessagingPort,
    registry::DestinationRegistry,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    registry: Arc<DestinationRegistry>,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, registry: Arc<DestinationRegistry>) -> Self {
        Self { bot, registry }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(channel: ChannelId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(channel.0)
    }

    fn map_err(e: RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// The bot can no longer reach this chat: forget it instead of failing every round.
    async fn handle_send_error(&self, channel: ChannelId, e: RequestError) -> Result<()> {
        if is_chat_gone(&e) {
            tracing::warn!(chat_id = channel.0, "chat unreachable ({e}); removing destination");
            if let Err(reg_err) = self.registry.remove(channel.0).await {
                tracing::error!(chat_id = channel.0, "failed to update destinations: {reg_err}");
            }
            return Ok(());
        }
        Err(Self::map_err(e))
    }

    async fn send_html(
        &self,
        channel: ChannelId,
        html: &str,
    ) -> std::result::Result<(), RequestError> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(channel), html.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }
}

/// Errors after which sending to the chat will never succeed.
pub fn is_chat_gone(e: &RequestError) -> bool {
    matches!(
        e,
        RequestError::Api(
            ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::ChatNotFound
                | ApiError::UserDeactivated
        ) | RequestError::MigrateToChatId(_)
    )
}

/// Caption used when the image could not be attached: the html body plus the raw link.
fn caption_with_link(post: &PostMessage, image_url: &str) -> String {
    format!("{}\n{}", post.to_html(), escape_html(image_url))
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn destinations(&self) -> Result<Vec<Destination>> {
        Ok(self.registry.list().await)
    }

    async fn send_post(&self, channel: ChannelId, post: &PostMessage) -> Result<()> {
        let html = post.to_html();
        let Some(image_url) = post.image_url.as_deref() else {
            return match self.send_html(channel, &html).await {
                Ok(()) => Ok(()),
                Err(e) => self.handle_send_error(channel, e).await,
            };
        };

        let Ok(url) = reqwest::Url::parse(image_url) else {
            tracing::warn!(image_url, "image url does not parse; sending text only");
            return match self.send_html(channel, &caption_with_link(post, image_url)).await {
                Ok(()) => Ok(()),
                Err(e) => self.handle_send_error(channel, e).await,
            };
        };

        let sent = self
            .with_retry(|| {
                self.bot
                    .send_photo(Self::tg_chat(channel), InputFile::url(url.clone()))
                    .caption(html.clone())
                    .parse_mode(ParseMode::Html)
            })
            .await;

        match sent {
            Ok(_) => Ok(()),
            Err(e) if is_chat_gone(&e) => self.handle_send_error(channel, e).await,
            // Telegram could not fetch or decode the url (gallery pages, videos, dead links).
            Err(RequestError::Api(api)) => {
                tracing::info!(image_url, "photo rejected ({api}); sending as text");
                match self.send_html(channel, &caption_with_link(post, image_url)).await {
                    Ok(()) => Ok(()),
                    Err(e) => self.handle_send_error(channel, e).await,
                }
            }
            Err(e) => Err(Self::map_err(e)),
        }
    }

    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<()> {
        let sent = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(channel), text.to_string()))
            .await;
        match sent {
            Ok(_) => Ok(()),
            Err(e) => self.handle_send_error(channel, e).await,
        }
    }
}
