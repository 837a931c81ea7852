use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::{
    domain::{DestinationId, Post, Scope},
    formatting::to_post,
    ports::RecordStore,
    selector::{build_title_query, SearchHit, Selector},
    Result,
};

/// Selection plus record keeping, shared by the delivery loop and the chat commands.
///
/// Every operation that checks the store and then records into it runs under the round
/// lock, so two deliveries cannot both claim the same "unused" post.
pub struct PostService {
    selector: Selector,
    store: Arc<dyn RecordStore>,
    round_lock: Mutex<()>,
}

impl PostService {
    pub fn new(selector: Selector, store: Arc<dyn RecordStore>) -> Self {
        Self {
            selector,
            store,
            round_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn lock_round(&self) -> MutexGuard<'_, ()> {
        self.round_lock.lock().await
    }

    /// Random undelivered hot post. Not recorded; the caller owns record keeping.
    ///
    /// Callers must hold the round lock.
    pub(crate) async fn pick_shared(&self) -> Result<Post> {
        let candidate = self.selector.select_hot().await?;
        Ok(to_post(&candidate))
    }

    /// Random undelivered hot post, recorded against `destination`.
    ///
    /// Callers must hold the round lock.
    pub(crate) async fn pick_for(&self, destination: DestinationId) -> Result<Post> {
        let candidate = self.selector.select_hot().await?;
        self.store
            .record(&candidate.id, Scope::Destination(destination))
            .await?;
        Ok(to_post(&candidate))
    }

    /// Fresh post for one destination (the `new` command).
    pub async fn fresh_post(&self, destination: DestinationId) -> Result<Post> {
        let _round = self.lock_round().await;
        self.pick_for(destination).await
    }

    /// Title search for one destination (the `search` command). The hit is recorded even
    /// when it came from the fallback window.
    pub async fn search_post(&self, terms: &str, destination: DestinationId) -> Result<Post> {
        let query = build_title_query(terms);
        let _round = self.lock_round().await;
        let (candidate, hit) = self.selector.search(&query).await?;
        if hit == SearchHit::Fallback {
            tracing::info!(id = %candidate.id, query, "no unused match; using fallback result");
        }
        self.store
            .record(&candidate.id, Scope::Destination(destination))
            .await?;
        Ok(to_post(&candidate))
    }
}
