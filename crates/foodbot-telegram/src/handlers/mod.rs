//! Telegram update handlers.
//!
//! - messages: register the chat as a destination, then route `/commands`
//! - my_chat_member: track joins, kicks and permission changes

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Chat, ChatMemberKind, ChatMemberUpdated, Message},
};

use foodbot_core::registry::KnownChat;

use crate::router::AppState;

mod commands;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        if let Err(e) = state
            .registry
            .observe(msg.chat.id.0, &chat_title(&msg.chat))
            .await
        {
            tracing::error!(chat_id = msg.chat.id.0, "failed to register chat: {e}");
        }
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(&msg, text, state).await;
        }
    }

    Ok(())
}

pub async fn handle_my_chat_member(
    upd: ChatMemberUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = upd.chat.id.0;
    let result = match send_permission(&upd.new_chat_member.kind, upd.chat.is_channel()) {
        Some(can_send) => state
            .registry
            .upsert(KnownChat {
                id: chat_id,
                title: chat_title(&upd.chat),
                can_send,
            })
            .await,
        None => state.registry.remove(chat_id).await.map(|_| ()),
    };

    if let Err(e) = result {
        tracing::error!(chat_id, "failed to update destinations: {e}");
    }
    Ok(())
}

/// `None` when the bot is no longer in the chat; otherwise whether it may post there.
pub fn send_permission(kind: &ChatMemberKind, is_channel: bool) -> Option<bool> {
    match kind {
        ChatMemberKind::Left | ChatMemberKind::Banned(_) => None,
        ChatMemberKind::Owner(_) => Some(true),
        ChatMemberKind::Administrator(admin) => Some(!is_channel || admin.can_post_messages),
        ChatMemberKind::Member => Some(!is_channel),
        ChatMemberKind::Restricted(r) => Some(r.is_member && r.can_send_messages),
    }
}

fn chat_title(chat: &Chat) -> String {
    chat.title()
        .or_else(|| chat.username())
        .unwrap_or_default()
        .to_string()
}
