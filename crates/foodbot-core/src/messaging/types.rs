use crate::domain::{ChannelId, DestinationId, UserId};

/// An inbound `/command` with the context it was invoked in.
#[derive(Clone, Debug)]
pub struct CommandRequest {
    pub destination: DestinationId,
    pub channel: ChannelId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    /// Group or supergroup (as opposed to a private chat or a channel).
    pub is_group: bool,
    pub text: String,
}

/// What a command answers with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Post(crate::formatting::PostMessage),
    Text(String),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}
