use std::sync::Arc;

use teloxide::{prelude::*, types::Chat};

use foodbot_core::{
    domain::{ChannelId, DestinationId, UserId},
    messaging::types::CommandRequest,
};

use crate::router::AppState;

pub async fn handle_command(msg: &Message, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let from = msg.from();
    let req = command_request(
        &msg.chat,
        from.map(|u| UserId(u.id.0 as i64)),
        from.and_then(|u| u.username.clone()),
        text,
    );

    if let Err(e) = state.commands.dispatch(&req).await {
        tracing::error!(chat_id = msg.chat.id.0, text, "command failed: {e}");
    }
    Ok(())
}

/// Each chat is both the destination and the channel replies go to.
fn command_request(
    chat: &Chat,
    user_id: Option<UserId>,
    username: Option<String>,
    text: &str,
) -> CommandRequest {
    CommandRequest {
        destination: DestinationId(chat.id.0),
        channel: ChannelId(chat.id.0),
        user_id,
        username,
        is_group: chat.is_group() || chat.is_supergroup(),
        text: text.to_string(),
    }
}
