use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChannelId, Destination},
    errors::Error,
    formatting::PostMessage,
    messaging::{port::MessagingPort, types::Reply},
    Result,
};

/// Records every send; `failing` channels return an error instead.
#[derive(Default)]
pub(crate) struct FakeMessenger {
    pub destinations: Vec<Destination>,
    pub failing: Vec<ChannelId>,
    pub sends: Mutex<Vec<(ChannelId, Reply)>>,
}

impl FakeMessenger {
    pub fn with_destinations(destinations: Vec<Destination>) -> Self {
        Self {
            destinations,
            ..Default::default()
        }
    }

    pub fn sends(&self) -> Vec<(ChannelId, Reply)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sends()
            .into_iter()
            .filter_map(|(_, r)| match r {
                Reply::Text(t) => Some(t),
                Reply::Post(_) => None,
            })
            .collect()
    }

    /// (channel, title) of every post sent.
    pub fn posts(&self) -> Vec<(ChannelId, String)> {
        self.sends()
            .into_iter()
            .filter_map(|(c, r)| match r {
                Reply::Post(p) => Some((c, p.title)),
                Reply::Text(_) => None,
            })
            .collect()
    }

    fn check(&self, channel: ChannelId) -> Result<()> {
        if self.failing.contains(&channel) {
            return Err(Error::External(format!("send to {} failed", channel.0)));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn destinations(&self) -> Result<Vec<Destination>> {
        Ok(self.destinations.clone())
    }

    async fn send_post(&self, channel: ChannelId, post: &PostMessage) -> Result<()> {
        self.check(channel)?;
        self.sends
            .lock()
            .unwrap()
            .push((channel, Reply::Post(post.clone())));
        Ok(())
    }

    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<()> {
        self.check(channel)?;
        self.sends
            .lock()
            .unwrap()
            .push((channel, Reply::Text(text.to_string())));
        Ok(())
    }
}
