//! Deduplicated post selection.
//!
//! Hot mode: fetch a batch, drop already-delivered ids, pick uniformly at random among the
//! rest. An empty pick doubles the batch until `max_batch`; an empty pick at the cap is
//! `SearchExhausted`.
//!
//! Search mode: first unused relevance hit, else the first hit of a recency-restricted
//! fallback query (duplicates allowed there), else `NoMatch`.

use std::sync::Arc;

use rand::seq::IndexedRandom;

use crate::{
    domain::Candidate,
    errors::Error,
    ports::{ContentSource, RecordStore, SearchRequest, TimeWindow},
    subreddits::Subreddits,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub initial_batch: usize,
    pub max_batch: usize,
    pub search_limit: usize,
    pub fallback_window: TimeWindow,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            initial_batch: 20,
            max_batch: 500,
            search_limit: 100,
            fallback_window: TimeWindow::Month,
        }
    }
}

/// Where a search result came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchHit {
    /// Unused, relevance-ranked.
    Fresh,
    /// First result of the fallback window; may already have been delivered.
    Fallback,
}

pub struct Selector {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn RecordStore>,
    subreddits: Subreddits,
    policy: SelectionPolicy,
}

impl Selector {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn RecordStore>,
        subreddits: Subreddits,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            source,
            store,
            subreddits,
            policy,
        }
    }

    /// Pick a random undelivered candidate from the hot listing.
    pub async fn select_hot(&self) -> Result<Candidate> {
        let subs = self.subreddits.current().await?;
        let max_batch = self.policy.max_batch.max(1);
        let mut limit = self.policy.initial_batch.clamp(1, max_batch);

        loop {
            let batch = self.source.hot(&subs, limit).await?;
            let offered = batch.len();
            let unused = self.unused(batch).await?;

            if let Some(pick) = choose_random(unused.as_slice()) {
                tracing::debug!(
                    limit,
                    offered,
                    unused = unused.len(),
                    id = %pick.id,
                    "selected hot post"
                );
                return Ok(pick.clone());
            }

            if limit >= max_batch {
                tracing::error!(limit, "search limit reached without finding a new post");
                return Err(Error::SearchExhausted { max_batch });
            }

            let next = limit.saturating_mul(2).min(max_batch);
            tracing::info!(
                limit,
                next,
                offered,
                "every candidate already delivered; widening search"
            );
            limit = next;
        }
    }

    /// Find a post whose title matches `query` (a lucene query string).
    pub async fn search(&self, query: &str) -> Result<(Candidate, SearchHit)> {
        let subs = self.subreddits.current().await?;

        let relevant = self
            .source
            .search(
                &subs,
                &SearchRequest {
                    query: query.to_string(),
                    window: TimeWindow::All,
                    limit: self.policy.search_limit,
                },
            )
            .await?;
        for candidate in relevant {
            if !self.store.is_used(&candidate.id).await? {
                return Ok((candidate, SearchHit::Fresh));
            }
        }

        let fallback = self
            .source
            .search(
                &subs,
                &SearchRequest {
                    query: query.to_string(),
                    window: self.policy.fallback_window,
                    limit: 1,
                },
            )
            .await?;
        match fallback.into_iter().next() {
            Some(candidate) => Ok((candidate, SearchHit::Fallback)),
            None => {
                tracing::warn!(query, subreddits = ?subs, "no search results");
                Err(Error::NoMatch {
                    query: query.to_string(),
                })
            }
        }
    }

    async fn unused(&self, batch: Vec<Candidate>) -> Result<Vec<Candidate>> {
        let mut out = Vec::with_capacity(batch.len());
        for candidate in batch {
            if !self.store.is_used(&candidate.id).await? {
                out.push(candidate);
            }
        }
        Ok(out)
    }
}

/// Restrict a search to post titles and drop text-only posts.
pub fn build_title_query(terms: &str) -> String {
    format!("title:\"{}\" self:no", terms.replace('"', ""))
}

fn choose_random(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.choose(&mut rand::rng())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{domain::Scope, store::MemoryRecordStore};

    pub(crate) fn cand(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: format!("post {id}"),
            url: Some(format!("https://i.redd.it/{id}.jpg")),
            permalink: format!("/r/food/comments/{id}/"),
        }
    }

    pub(crate) fn cands(prefix: &str, n: usize) -> Vec<Candidate> {
        (0..n).map(|i| cand(&format!("{prefix}{i}"))).collect()
    }

    /// Hot listing = a fixed ranked list truncated to `limit`; searches keyed by window.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub hot: Vec<Candidate>,
        pub search: HashMap<&'static str, Vec<Candidate>>,
        pub hot_limits: Mutex<Vec<usize>>,
        pub search_calls: Mutex<Vec<SearchRequest>>,
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn hot(&self, _subreddits: &[String], limit: usize) -> Result<Vec<Candidate>> {
            self.hot_limits.lock().unwrap().push(limit);
            Ok(self.hot.iter().take(limit).cloned().collect())
        }

        async fn search(
            &self,
            _subreddits: &[String],
            req: &SearchRequest,
        ) -> Result<Vec<Candidate>> {
            self.search_calls.lock().unwrap().push(req.clone());
            Ok(self
                .search
                .get(req.window.as_str())
                .map(|v| v.iter().take(req.limit).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn selector(source: FakeSource, store: Arc<MemoryRecordStore>) -> (Selector, Arc<FakeSource>) {
        let source = Arc::new(source);
        let sel = Selector::new(
            source.clone(),
            store,
            Subreddits::fixed(["food"]),
            SelectionPolicy::default(),
        );
        (sel, source)
    }

    async fn mark_used(store: &MemoryRecordStore, ids: impl IntoIterator<Item = String>) {
        for id in ids {
            store.record(&id, Scope::All).await.unwrap();
        }
    }

    #[tokio::test]
    async fn picks_one_of_the_unused_hot_posts() {
        let store = Arc::new(MemoryRecordStore::new());
        let hot = cands("h", 20);
        let ids: HashSet<String> = hot.iter().map(|c| c.id.clone()).collect();
        let (sel, source) = selector(
            FakeSource {
                hot,
                ..Default::default()
            },
            store,
        );

        let pick = sel.select_hot().await.unwrap();
        assert!(ids.contains(&pick.id));
        assert_eq!(*source.hot_limits.lock().unwrap(), vec![20]);
    }

    #[tokio::test]
    async fn never_returns_a_used_post() {
        let store = Arc::new(MemoryRecordStore::new());
        let hot = cands("h", 20);
        mark_used(&store, hot.iter().skip(3).map(|c| c.id.clone())).await;
        let (sel, _) = selector(
            FakeSource {
                hot,
                ..Default::default()
            },
            store.clone(),
        );

        for _ in 0..50 {
            let pick = sel.select_hot().await.unwrap();
            assert!(!store.is_used(&pick.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn doubles_the_batch_when_everything_is_used() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut hot = cands("h", 20);
        mark_used(&store, hot.iter().map(|c| c.id.clone())).await;
        let mut deeper = cands("d", 20);
        mark_used(&store, deeper.iter().skip(1).map(|c| c.id.clone())).await;
        // Put the single unused post last in the doubled batch of 40.
        deeper.rotate_left(1);
        hot.extend(deeper);

        let (sel, source) = selector(
            FakeSource {
                hot,
                ..Default::default()
            },
            store,
        );

        let pick = sel.select_hot().await.unwrap();
        assert_eq!(pick.id, "d0");
        assert_eq!(*source.hot_limits.lock().unwrap(), vec![20, 40]);
    }

    #[tokio::test]
    async fn exhausts_at_the_cap() {
        let store = Arc::new(MemoryRecordStore::new());
        let hot = cands("h", 600);
        mark_used(&store, hot.iter().map(|c| c.id.clone())).await;
        let (sel, source) = selector(
            FakeSource {
                hot,
                ..Default::default()
            },
            store,
        );

        let err = sel.select_hot().await.unwrap_err();
        assert!(matches!(err, Error::SearchExhausted { max_batch: 500 }));
        assert_eq!(
            *source.hot_limits.lock().unwrap(),
            vec![20, 40, 80, 160, 320, 500]
        );
    }

    #[tokio::test]
    async fn search_returns_first_unused_relevant_hit() {
        let store = Arc::new(MemoryRecordStore::new());
        mark_used(&store, ["s0".to_string()]).await;
        let mut search = HashMap::new();
        search.insert("all", cands("s", 3));
        let (sel, source) = selector(
            FakeSource {
                search,
                ..Default::default()
            },
            store,
        );

        let (hit, kind) = sel.search(&build_title_query("pizza")).await.unwrap();
        assert_eq!(hit.id, "s1");
        assert_eq!(kind, SearchHit::Fresh);
        let calls = source.search_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query, "title:\"pizza\" self:no");
        assert_eq!(calls[0].limit, 100);
    }

    #[tokio::test]
    async fn search_falls_back_to_monthly_first_result_even_if_used() {
        let store = Arc::new(MemoryRecordStore::new());
        mark_used(&store, ["s0".to_string(), "m0".to_string()]).await;
        let mut search = HashMap::new();
        search.insert("all", cands("s", 1));
        search.insert("month", cands("m", 2));
        let (sel, _) = selector(
            FakeSource {
                search,
                ..Default::default()
            },
            store,
        );

        let (hit, kind) = sel.search("pizza").await.unwrap();
        assert_eq!(hit.id, "m0");
        assert_eq!(kind, SearchHit::Fallback);
    }

    #[tokio::test]
    async fn search_without_any_results_is_no_match() {
        let store = Arc::new(MemoryRecordStore::new());
        let (sel, source) = selector(FakeSource::default(), store);

        let err = sel.search("pizza").await.unwrap_err();
        assert!(matches!(err, Error::NoMatch { .. }));
        let windows: Vec<_> = source
            .search_calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.window)
            .collect();
        assert_eq!(windows, vec![TimeWindow::All, TimeWindow::Month]);
    }

    #[test]
    fn title_query_excludes_self_posts() {
        assert_eq!(
            build_title_query("deep dish"),
            "title:\"deep dish\" self:no"
        );
        assert_eq!(build_title_query("a\"b"), "title:\"ab\" self:no");
    }
}
