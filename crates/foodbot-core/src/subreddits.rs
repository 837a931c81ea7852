//! Category (subreddit) configuration.

use std::path::PathBuf;

use crate::{errors::Error, Result};

/// The set of subreddits posts are drawn from.
///
/// File-backed lists are re-read on every call so edits apply without a restart.
#[derive(Clone, Debug)]
pub enum Subreddits {
    File(PathBuf),
    Fixed(Vec<String>),
}

impl Subreddits {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn fixed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fixed(names.into_iter().map(Into::into).collect())
    }

    pub async fn current(&self) -> Result<Vec<String>> {
        let names = match self {
            Subreddits::File(path) => {
                let txt = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                parse_list(&txt)
            }
            Subreddits::Fixed(names) => parse_list(&names.join("\n")),
        };

        if names.is_empty() {
            return Err(Error::Config("no subreddits configured".to_string()));
        }
        Ok(names)
    }
}

/// Newline-delimited names; blank lines are ignored.
pub fn parse_list(txt: &str) -> Vec<String> {
    txt.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
