//! Reddit adapter (hot listings and title search).
//!
//! App-only OAuth: a `client_credentials` token is fetched on first use and cached until
//! shortly before it expires. Listings come back in pages of at most 100 children, so
//! larger limits walk the `after` cursor.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use foodbot_core::{
    config::Config,
    domain::Candidate,
    errors::Error,
    ports::{ContentSource, SearchRequest},
    Result,
};
use serde::Deserialize;
use tokio::sync::Mutex;

pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const API_BASE: &str = "https://oauth.reddit.com";
const PAGE_SIZE: usize = 100;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<ListingChild>,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListingChild {
    pub kind: String,
    pub data: PostData,
}

#[derive(Debug, Deserialize)]
pub struct PostData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub url: Option<String>,
    #[serde(default)]
    pub permalink: String,
}

impl From<PostData> for Candidate {
    fn from(p: PostData) -> Self {
        Candidate {
            id: p.id,
            title: p.title,
            url: p.url.filter(|u| !u.trim().is_empty()),
            permalink: p.permalink,
        }
    }
}

/// Posts (`t3`) from one listing page, plus the cursor for the next one.
pub fn parse_listing(body: &str) -> Result<(Vec<Candidate>, Option<String>)> {
    let listing: Listing = serde_json::from_str(body)
        .map_err(|e| Error::External(format!("reddit listing parse error: {e}")))?;
    let posts = listing
        .data
        .children
        .into_iter()
        .filter(|c| c.kind == "t3")
        .map(|c| Candidate::from(c.data))
        .collect();
    Ok((posts, listing.data.after))
}

#[derive(Debug)]
pub struct RedditClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("reqwest client build error: {e}")))?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Point the client at other token and API hosts (defaults: the public Reddit ones).
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.reddit_client_id,
            &cfg.reddit_client_secret,
            &cfg.reddit_user_agent,
            cfg.http_timeout,
        )
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(tok) = cached.as_ref() {
            if Instant::now() < tok.expires_at {
                return Ok(tok.value.clone());
            }
        }

        let resp = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| Error::External(format!("reddit token request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "reddit token request failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let tok: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("reddit token json error: {e}")))?;

        let lifetime = Duration::from_secs(tok.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!(expires_in = tok.expires_in, "reddit token refreshed");
        *cached = Some(CachedToken {
            value: tok.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(tok.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    #[cfg(test)]
    async fn seed_token(&self, value: &str) {
        *self.token.lock().await = Some(CachedToken {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        });
    }

    /// One listing page. A 401 drops the cached token and retries once.
    async fn fetch_page(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<(Vec<Candidate>, Option<String>)> {
        let url = format!("{}{path}", self.api_base);
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(params)
                .send()
                .await
                .map_err(|e| Error::External(format!("reddit request error: {e}")))?;

            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED && !retried {
                tracing::warn!(path, "reddit rejected the token; refreshing");
                self.invalidate_token().await;
                retried = true;
                continue;
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::External(format!(
                    "reddit {path} failed: {status} {}",
                    body.chars().take(200).collect::<String>()
                )));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| Error::External(format!("reddit response read error: {e}")))?;
            return parse_listing(&body);
        }
    }

    /// Walk pages until `limit` posts are collected or the listing ends.
    async fn collect(
        &self,
        path: &str,
        base_params: &[(&str, String)],
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let mut out: Vec<Candidate> = Vec::with_capacity(limit);
        let mut after: Option<String> = None;

        while out.len() < limit {
            let page_size = (limit - out.len()).min(PAGE_SIZE);
            let mut params = base_params.to_vec();
            params.push(("limit", page_size.to_string()));
            params.push(("raw_json", "1".to_string()));
            if let Some(cursor) = &after {
                params.push(("after", cursor.clone()));
            }

            let (page, next) = self.fetch_page(path, &params).await?;
            let got = page.len();
            out.extend(page);
            tracing::debug!(path, got, total = out.len(), "reddit page fetched");

            match next {
                Some(cursor) if got > 0 => after = Some(cursor),
                _ => break,
            }
        }

        out.truncate(limit);
        Ok(out)
    }
}

/// `["food", "FoodPorn"]` -> `/r/food+FoodPorn`.
pub fn multireddit_path(subreddits: &[String]) -> String {
    format!("/r/{}", subreddits.join("+"))
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn hot(&self, subreddits: &[String], limit: usize) -> Result<Vec<Candidate>> {
        let path = format!("{}/hot", multireddit_path(subreddits));
        self.collect(&path, &[], limit).await
    }

    async fn search(&self, subreddits: &[String], req: &SearchRequest) -> Result<Vec<Candidate>> {
        let path = format!("{}/search", multireddit_path(subreddits));
        let params = [
            ("q", req.query.clone()),
            ("sort", "relevance".to_string()),
            ("syntax", "lucene".to_string()),
            ("restrict_sr", "on".to_string()),
            ("t", req.window.as_str().to_string()),
        ];
        self.collect(&path, &params, req.limit).await
    }
}
