//! Hexagonal ports. Reddit, the record file and pm2 live behind these traits in adapter
//! code; the selector, delivery loop and command layer only see the traits.

use async_trait::async_trait;

use crate::{
    domain::{Candidate, Scope},
    Result,
};

/// Recency restriction for searches: unrestricted, or the fallback's last month.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeWindow {
    Month,
    All,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Month => "month",
            TimeWindow::All => "all",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    /// Lucene query string.
    pub query: String,
    pub window: TimeWindow,
    pub limit: usize,
}

/// Source of candidate posts.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Popularity ("hot") listing across `subreddits`, best first, at most `limit` items.
    async fn hot(&self, subreddits: &[String], limit: usize) -> Result<Vec<Candidate>>;

    /// Relevance-ranked search across `subreddits`, most relevant first.
    async fn search(&self, subreddits: &[String], req: &SearchRequest) -> Result<Vec<Candidate>>;
}

/// Durable set of already-delivered post ids.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// True when any record exists for `post_id`, whatever its scope.
    async fn is_used(&self, post_id: &str) -> Result<bool>;

    /// Idempotent insert.
    async fn record(&self, post_id: &str, scope: Scope) -> Result<()>;

    async fn clear_all(&self) -> Result<()>;

    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// External process manager that owns this process.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Ask for a restart. `Ok(false)` means the supervisor does not know this process.
    async fn restart(&self) -> Result<bool>;
}
