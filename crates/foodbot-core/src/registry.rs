//! Chats the bot is a member of.
//!
//! Telegram has no "list my chats" call, so the adapter feeds membership changes and
//! inbound messages in here and the delivery loop reads the list back out. Persisted as
//! JSON next to the record store so a restart keeps delivering to the same chats.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{Channel, ChannelId, Destination, DestinationId},
    errors::Error,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownChat {
    pub id: i64,
    pub title: String,
    pub can_send: bool,
}

impl KnownChat {
    /// One Telegram chat is one destination with a single channel.
    pub fn to_destination(&self) -> Destination {
        Destination {
            id: DestinationId(self.id),
            name: self.title.clone(),
            channels: vec![Channel {
                id: ChannelId(self.id),
                name: self.title.clone(),
                can_send: self.can_send,
            }],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFileData {
    chats: Vec<KnownChat>,
}

#[derive(Debug)]
pub struct DestinationRegistry {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    chats: Mutex<BTreeMap<i64, KnownChat>>,
}

impl DestinationRegistry {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            chats: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let chats = load_registry_file(&path).await?;
        tracing::info!(path = %path.display(), chats = chats.len(), "destination registry loaded");
        Ok(Self {
            path: Some(path),
            chats: Mutex::new(chats),
        })
    }

    pub async fn list(&self) -> Vec<Destination> {
        self.chats
            .lock()
            .await
            .values()
            .map(KnownChat::to_destination)
            .collect()
    }

    pub async fn get(&self, id: i64) -> Option<KnownChat> {
        self.chats.lock().await.get(&id).cloned()
    }

    /// Insert or replace. Writes only when something changed.
    pub async fn upsert(&self, chat: KnownChat) -> Result<()> {
        let mut chats = self.chats.lock().await;
        if chats.get(&chat.id) == Some(&chat) {
            return Ok(());
        }
        tracing::info!(
            chat_id = chat.id,
            title = %chat.title,
            can_send = chat.can_send,
            "destination updated"
        );
        chats.insert(chat.id, chat);
        self.persist(&chats).await
    }

    /// Seen through an inbound message: add the chat if unknown, refresh its title.
    /// Send permission is left to membership updates.
    pub async fn observe(&self, id: i64, title: &str) -> Result<()> {
        let mut chats = self.chats.lock().await;
        match chats.get_mut(&id) {
            Some(known) if known.title == title => return Ok(()),
            Some(known) => known.title = title.to_string(),
            None => {
                tracing::info!(chat_id = id, title, "destination discovered");
                chats.insert(
                    id,
                    KnownChat {
                        id,
                        title: title.to_string(),
                        can_send: true,
                    },
                );
            }
        }
        self.persist(&chats).await
    }

    pub async fn remove(&self, id: i64) -> Result<bool> {
        let mut chats = self.chats.lock().await;
        if chats.remove(&id).is_none() {
            return Ok(false);
        }
        tracing::info!(chat_id = id, "destination removed");
        self.persist(&chats).await?;
        Ok(true)
    }

    async fn persist(&self, chats: &BTreeMap<i64, KnownChat>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = RegistryFileData {
            chats: chats.values().cloned().collect(),
        };
        let txt = serde_json::to_string_pretty(&data)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, txt).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

async fn load_registry_file(path: &Path) -> Result<BTreeMap<i64, KnownChat>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    if txt.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let data: RegistryFileData = serde_json::from_str(&txt)
        .map_err(|e| Error::Config(format!("invalid destinations file {}: {e}", path.display())))?;
    Ok(data.chats.into_iter().map(|c| (c.id, c)).collect())
}
