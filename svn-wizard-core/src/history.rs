// commit message history - bounded, persisted as json, oldest records evicted first

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// records kept at rest
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub message: String,
    /// milliseconds since the unix epoch; unique within a store
    pub timestamp: i64,
}

impl HistoryRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_timestamp(message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// keep only the newest `capacity` records, sorted oldest first
fn evict_oldest(records: &mut Vec<HistoryRecord>, capacity: usize) -> usize {
    if records.len() <= capacity {
        return 0;
    }
    records.sort_by_key(|r| r.timestamp);
    let excess = records.len() - capacity;
    records.drain(..excess);
    excess
}

/// capacity-bounded store of commit messages.
///
/// appends are serialized so no two can check capacity against the same
/// count; readers always see a complete snapshot.
pub struct HistoryStore {
    path: Option<PathBuf>,
    capacity: usize,
    records: RwLock<Vec<HistoryRecord>>,
    append_lock: Mutex<()>,
}

impl HistoryStore {
    /// a store that lives only in memory
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity,
            records: RwLock::new(Vec::new()),
            append_lock: Mutex::new(()),
        }
    }

    /// open the json file at `path`, starting empty when it does not exist yet
    pub async fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let mut records: Vec<HistoryRecord> = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Vec::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse history file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read history file {}", path.display()));
            }
        };

        let dropped = evict_oldest(&mut records, capacity);
        if dropped > 0 {
            debug!(dropped, "history file held more records than allowed");
        }

        Ok(Self {
            path: Some(path),
            capacity,
            records: RwLock::new(records),
            append_lock: Mutex::new(()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// insert `record`, evict the oldest overflow and persist, all before returning
    pub async fn append(&self, mut record: HistoryRecord) -> Result<HistoryRecord> {
        let _guard = self.append_lock.lock().await;

        let mut next = self.records.read().await.clone();

        // timestamps identify records, so nudge collisions forward
        while next.iter().any(|r| r.timestamp == record.timestamp) {
            record.timestamp += 1;
        }
        next.push(record.clone());

        let evicted = evict_oldest(&mut next, self.capacity);
        if evicted > 0 {
            debug!(evicted, "evicted old history records");
        }

        if let Some(path) = &self.path {
            persist(path, &next).await?;
        }

        *self.records.write().await = next;
        Ok(record)
    }

    /// convenience for `append(HistoryRecord::new(message))`
    pub async fn add(&self, message: impl Into<String>) -> Result<HistoryRecord> {
        self.append(HistoryRecord::new(message)).await
    }

    /// all records in storage order
    pub async fn list(&self) -> Vec<HistoryRecord> {
        self.records.read().await.clone()
    }

    /// all records, newest first, for display
    pub async fn list_newest_first(&self) -> Vec<HistoryRecord> {
        let mut records = self.list().await;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// write to a sibling temp file, then rename over the target
async fn persist(path: &Path, records: &[HistoryRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("failed to create history directory")?;
    }
    let contents = serde_json::to_string_pretty(records).context("failed to serialize history")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        warn!(error = %e, "failed to replace history file");
        return Err(e).with_context(|| format!("failed to replace {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn list_newest_first_orders_by_timestamp() {
        let store = HistoryStore::in_memory(MAX_HISTORY);
        store.append(HistoryRecord::with_timestamp("first", 1_000)).await.unwrap();
        store.append(HistoryRecord::with_timestamp("second", 2_000)).await.unwrap();
        store.append(HistoryRecord::with_timestamp("third", 3_000)).await.unwrap();

        let messages: Vec<String> = store
            .list_newest_first()
            .await
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn sixty_appends_keep_the_fifty_newest() {
        let store = HistoryStore::in_memory(MAX_HISTORY);
        for i in 0..60 {
            store
                .append(HistoryRecord::with_timestamp(format!("msg {i}"), 10_000 + i))
                .await
                .unwrap();
        }

        let records = store.list().await;
        assert_eq!(records.len(), 50);
        let oldest_kept = records.iter().map(|r| r.timestamp).min().unwrap();
        // the ten evicted records had timestamps 10_000..10_010
        assert_eq!(oldest_kept, 10_010);
    }

    #[tokio::test]
    async fn fifty_first_append_evicts_only_the_oldest() {
        let store = HistoryStore::in_memory(MAX_HISTORY);
        for i in 0..50 {
            store.append(HistoryRecord::with_timestamp("m", i)).await.unwrap();
        }
        assert_eq!(store.len().await, 50);

        store.append(HistoryRecord::with_timestamp("newest", 100)).await.unwrap();
        let records = store.list().await;
        assert_eq!(records.len(), 50);
        assert!(records.iter().all(|r| r.timestamp != 0));
        assert!(records.iter().any(|r| r.message == "newest"));
    }

    #[tokio::test]
    async fn colliding_timestamps_are_made_unique() {
        let store = HistoryStore::in_memory(MAX_HISTORY);
        let a = store.append(HistoryRecord::with_timestamp("a", 5)).await.unwrap();
        let b = store.append(HistoryRecord::with_timestamp("b", 5)).await.unwrap();
        assert_eq!(a.timestamp, 5);
        assert_eq!(b.timestamp, 6);
    }

    #[tokio::test]
    async fn concurrent_appends_never_exceed_capacity() {
        let store = Arc::new(HistoryStore::in_memory(10));
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add(format!("parallel {i}")).await.unwrap();
                assert!(store.len().await <= 10);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len().await, 10);
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let store = HistoryStore::open(&path, 3).await.unwrap();
        for i in 0..5 {
            store.append(HistoryRecord::with_timestamp(format!("m{i}"), i)).await.unwrap();
        }

        let reopened = HistoryStore::open(&path, 3).await.unwrap();
        let messages: Vec<String> = reopened.list().await.into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn reopening_with_a_smaller_capacity_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::open(&path, 10).await.unwrap();
        for i in 0..6 {
            store.append(HistoryRecord::with_timestamp("m", i)).await.unwrap();
        }

        let smaller = HistoryStore::open(&path, 2).await.unwrap();
        let timestamps: Vec<i64> = smaller.list().await.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![4, 5]);
    }

    #[test]
    fn created_at_round_trips_millis() {
        let record = HistoryRecord::with_timestamp("x", 1_700_000_000_123);
        assert_eq!(record.created_at().unwrap().timestamp_millis(), 1_700_000_000_123);
    }
}
