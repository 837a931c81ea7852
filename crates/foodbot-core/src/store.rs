//! Record store implementations.
//!
//! Records are `(post_id, scope)` pairs with no metadata. Membership checks ignore the
//! scope: a post delivered anywhere counts as used everywhere.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{domain::Scope, errors::Error, ports::RecordStore, Result};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record {
    pub post_id: String,
    pub scope: Scope,
}

impl Record {
    /// Key shown by diagnostics: `<post_id>:<scope>`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.post_id, self.scope)
    }
}

/// Ordered records plus a per-id count, so membership is a hash lookup.
#[derive(Clone, Debug, Default)]
struct RecordSet {
    records: BTreeSet<Record>,
    ids: HashMap<String, usize>,
}

impl RecordSet {
    fn from_records(records: BTreeSet<Record>) -> Self {
        let mut ids = HashMap::new();
        for r in &records {
            *ids.entry(r.post_id.clone()).or_insert(0) += 1;
        }
        Self { records, ids }
    }

    fn is_used(&self, post_id: &str) -> bool {
        self.ids.contains_key(post_id)
    }

    fn insert(&mut self, record: Record) -> bool {
        let post_id = record.post_id.clone();
        if !self.records.insert(record) {
            return false;
        }
        *self.ids.entry(post_id).or_insert(0) += 1;
        true
    }

    fn remove(&mut self, record: &Record) {
        if !self.records.remove(record) {
            return;
        }
        if let Some(n) = self.ids.get_mut(&record.post_id) {
            *n -= 1;
            if *n == 0 {
                self.ids.remove(&record.post_id);
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        self.records.iter().map(Record::key).collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    set: Mutex<RecordSet>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.set.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.set.lock().await.records.is_empty()
    }

    pub async fn contains(&self, post_id: &str, scope: Scope) -> bool {
        self.set.lock().await.records.contains(&Record {
            post_id: post_id.to_string(),
            scope,
        })
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn is_used(&self, post_id: &str) -> Result<bool> {
        Ok(self.set.lock().await.is_used(post_id))
    }

    async fn record(&self, post_id: &str, scope: Scope) -> Result<()> {
        self.set.lock().await.insert(Record {
            post_id: post_id.to_string(),
            scope,
        });
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        *self.set.lock().await = RecordSet::default();
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.set.lock().await.keys())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFileData {
    records: BTreeSet<Record>,
}

/// JSON-file backed store.
///
/// The whole set is held in memory and rewritten on every change (temp file + rename,
/// so a crash mid-write leaves the previous file intact). The in-memory set only changes
/// when the write succeeds.
#[derive(Debug)]
pub struct JsonFileRecordStore {
    path: PathBuf,
    set: Mutex<RecordSet>,
}

impl JsonFileRecordStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = load_record_file(&path).await?;
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "record store opened"
        );
        Ok(Self {
            path,
            set: Mutex::new(RecordSet::from_records(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &BTreeSet<Record>) -> Result<()> {
        let data = RecordFileData {
            records: records.clone(),
        };
        let txt = serde_json::to_string_pretty(&data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, txt)
            .await
            .map_err(|e| store_err(&self.path, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| store_err(&self.path, e))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn is_used(&self, post_id: &str) -> Result<bool> {
        Ok(self.set.lock().await.is_used(post_id))
    }

    async fn record(&self, post_id: &str, scope: Scope) -> Result<()> {
        let mut set = self.set.lock().await;
        let record = Record {
            post_id: post_id.to_string(),
            scope,
        };
        if !set.insert(record.clone()) {
            return Ok(());
        }
        if let Err(e) = self.persist(&set.records).await {
            tracing::error!(post_id, %scope, "failed to persist record: {e}");
            set.remove(&record);
            return Err(e);
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut set = self.set.lock().await;
        if let Err(e) = self.persist(&BTreeSet::new()).await {
            tracing::error!("failed to clear records: {e}");
            return Err(e);
        }
        let removed = std::mem::take(&mut *set).records.len();
        tracing::info!(removed, "record store cleared");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.set.lock().await.keys())
    }
}

async fn load_record_file(path: &Path) -> Result<BTreeSet<Record>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(store_err(path, e)),
    };
    if txt.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    let data: RecordFileData = serde_json::from_str(&txt)
        .map_err(|e| Error::StoreUnavailable(format!("{}: {e}", path.display())))?;
    Ok(data.records)
}

fn store_err(path: &Path, e: std::io::Error) -> Error {
    Error::StoreUnavailable(format!("{}: {e}", path.display()))
}
