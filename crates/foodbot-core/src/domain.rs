use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// A connected chat that receives deliveries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationId(pub i64);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A postable conversation inside a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub can_send: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Destination {
    /// First channel the bot is allowed to post in.
    pub fn delivery_target(&self) -> Option<&Channel> {
        self.channels.iter().find(|c| c.can_send)
    }
}

/// Where a delivery record applies.
///
/// Persisted as a plain string: the destination id, or `all` for a broadcast round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Scope {
    All,
    Destination(DestinationId),
}

const ALL_SCOPE: &str = "all";

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str(ALL_SCOPE),
            Scope::Destination(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s == ALL_SCOPE {
            return Ok(Scope::All);
        }
        s.parse::<i64>()
            .map(|id| Scope::Destination(DestinationId(id)))
            .map_err(|_| format!("invalid scope: {s}"))
    }
}

impl From<Scope> for String {
    fn from(s: Scope) -> Self {
        s.to_string()
    }
}

impl TryFrom<String> for Scope {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DestinationId> for Scope {
    fn from(id: DestinationId) -> Self {
        Scope::Destination(id)
    }
}

/// Raw post as offered by a content source, before normalization.
///
/// `permalink` is relative to the source's base URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub permalink: String,
}

/// Normalized post ready for display. Only `id` is ever persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub permalink: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trips_through_string() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!(
            "-1001234".parse::<Scope>().unwrap(),
            Scope::Destination(DestinationId(-1001234))
        );
        assert!("everyone".parse::<Scope>().is_err());

        let json = serde_json::to_string(&Scope::Destination(DestinationId(7))).unwrap();
        assert_eq!(json, "\"7\"");
    }

    #[test]
    fn delivery_target_is_first_sendable_channel() {
        let dest = Destination {
            id: DestinationId(1),
            name: "kitchen".to_string(),
            channels: vec![
                Channel {
                    id: ChannelId(10),
                    name: "announcements".to_string(),
                    can_send: false,
                },
                Channel {
                    id: ChannelId(11),
                    name: "general".to_string(),
                    can_send: true,
                },
                Channel {
                    id: ChannelId(12),
                    name: "random".to_string(),
                    can_send: true,
                },
            ],
        };
        assert_eq!(dest.delivery_target().map(|c| c.id), Some(ChannelId(11)));

        let muted = Destination {
            channels: vec![],
            ..dest
        };
        assert!(muted.delivery_target().is_none());
    }
}
