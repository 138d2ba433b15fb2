//! # Memory Storage - redb
//!
//! Embedded redb cache tier backing the in-process working-memory buffer,
//! its stale-memory archive, and pending nuance/dissonance reviews.
//!
//! redb transactions are synchronous; every operation here runs inside
//! [`tokio::task::spawn_blocking`] under a fixed timeout so a slow disk
//! can't stall the async runtime indefinitely.

mod convert;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use memory_core::error::{Error, Result};
use memory_core::storage::{NuanceStore, WorkingMemoryStore};
use memory_core::types::{NuanceReview, StaleMemoryItem, WorkingMemoryItem};
use tracing::debug;

const WORKING_MEMORY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("working_memory");
const STALE_MEMORY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("stale_memory");
const NUANCE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("nuance_reviews");

/// How long a single redb transaction is allowed to run before the caller
/// gets back [`Error::Timeout`].
const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Embedded redb-backed cache tier.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (creating if absent) the redb database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file can't be opened/created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)
            .map_err(|e| Error::Configuration(format!("failed to open redb database: {e}")))?;

        // Opening a table for the first time inside a write transaction
        // creates it; reads against a never-created table otherwise fail
        // with `TableDoesNotExist`, so ensure all tables exist up front.
        let txn = db.begin_write().map_err(|e| Error::Configuration(e.to_string()))?;
        {
            txn.open_table(WORKING_MEMORY_TABLE).map_err(|e| Error::Configuration(e.to_string()))?;
            txn.open_table(STALE_MEMORY_TABLE).map_err(|e| Error::Configuration(e.to_string()))?;
            txn.open_table(NUANCE_TABLE).map_err(|e| Error::Configuration(e.to_string()))?;
        }
        txn.commit().map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// An in-memory-backed store for tests: a `redb` database in a
    /// `tempfile`-managed temp directory, dropped (and deleted) with the
    /// returned guard.
    #[cfg(test)]
    fn temp() -> (Self, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let path = dir.path().join("cache.redb");
        let store = Self::open(path).expect("redb database should open");
        (store, dir)
    }

    async fn with_db_timeout<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(DB_OPERATION_TIMEOUT, tokio::task::spawn_blocking(operation))
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Database(format!("redb task panicked: {join_err}"))),
            Err(_) => Err(Error::Timeout(DB_OPERATION_TIMEOUT)),
        }
    }
}

fn working_memory_key(project_id: &str, id: uuid::Uuid) -> String {
    format!("{project_id}:{id}")
}

fn project_prefix(project_id: &str) -> String {
    format!("{project_id}:")
}

#[async_trait]
impl WorkingMemoryStore for RedbStore {
    async fn snapshot(&self, project_id: &str) -> Result<Vec<WorkingMemoryItem>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_string();
        self.with_db_timeout(move || {
            let txn = db.begin_read().map_err(|e| Error::Database(e.to_string()))?;
            let table = txn
                .open_table(WORKING_MEMORY_TABLE)
                .map_err(|e| Error::Database(e.to_string()))?;
            let prefix = project_prefix(&project_id);
            let mut items = Vec::new();
            for entry in table.iter().map_err(|e| Error::Database(e.to_string()))? {
                let (key, value) = entry.map_err(|e| Error::Database(e.to_string()))?;
                if key.value().starts_with(&prefix) {
                    items.push(convert::decode_working_memory_item(value.value())?);
                }
            }
            Ok(items)
        })
        .await
    }

    async fn persist(&self, project_id: &str, items: Vec<WorkingMemoryItem>) -> Result<()> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_string();
        self.with_db_timeout(move || {
            let txn = db.begin_write().map_err(|e| Error::Database(e.to_string()))?;
            {
                let mut table = txn
                    .open_table(WORKING_MEMORY_TABLE)
                    .map_err(|e| Error::Database(e.to_string()))?;

                let prefix = project_prefix(&project_id);
                let stale_keys: Vec<String> = table
                    .iter()
                    .map_err(|e| Error::Database(e.to_string()))?
                    .filter_map(|entry| entry.ok())
                    .map(|(k, _)| k.value().to_string())
                    .filter(|k| k.starts_with(&prefix))
                    .collect();
                for key in stale_keys {
                    table.remove(key.as_str()).map_err(|e| Error::Database(e.to_string()))?;
                }

                for item in &items {
                    let key = working_memory_key(&project_id, item.id);
                    let encoded = convert::encode_working_memory_item(item)?;
                    table
                        .insert(key.as_str(), encoded.as_slice())
                        .map_err(|e| Error::Database(e.to_string()))?;
                }
            }
            txn.commit().map_err(|e| Error::Database(e.to_string()))?;
            debug!(count = items.len(), "persisted working memory snapshot");
            Ok(())
        })
        .await
    }

    async fn archive(&self, project_id: &str, item: StaleMemoryItem) -> Result<()> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_string();
        self.with_db_timeout(move || {
            let txn = db.begin_write().map_err(|e| Error::Database(e.to_string()))?;
            {
                let mut table = txn
                    .open_table(STALE_MEMORY_TABLE)
                    .map_err(|e| Error::Database(e.to_string()))?;
                let key = working_memory_key(&project_id, item.id);
                let encoded = convert::encode_stale_item(&item)?;
                table
                    .insert(key.as_str(), encoded.as_slice())
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
            txn.commit().map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn stale(&self, project_id: &str, limit: usize) -> Result<Vec<StaleMemoryItem>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_string();
        self.with_db_timeout(move || {
            let txn = db.begin_read().map_err(|e| Error::Database(e.to_string()))?;
            let table = txn
                .open_table(STALE_MEMORY_TABLE)
                .map_err(|e| Error::Database(e.to_string()))?;
            let prefix = project_prefix(&project_id);
            let mut items = Vec::new();
            for entry in table.iter().map_err(|e| Error::Database(e.to_string()))? {
                let (key, value) = entry.map_err(|e| Error::Database(e.to_string()))?;
                if key.value().starts_with(&prefix) {
                    items.push(convert::decode_stale_item(value.value())?);
                }
            }
            items.sort_by_key(|item: &StaleMemoryItem| std::cmp::Reverse(item.archived_at));
            items.truncate(limit);
            Ok(items)
        })
        .await
    }
}

#[async_trait]
impl NuanceStore for RedbStore {
    async fn put(&self, review: NuanceReview) -> Result<()> {
        let db = Arc::clone(&self.db);
        self.with_db_timeout(move || {
            let txn = db.begin_write().map_err(|e| Error::Database(e.to_string()))?;
            {
                let mut table = txn
                    .open_table(NUANCE_TABLE)
                    .map_err(|e| Error::Database(e.to_string()))?;
                let key = review.id.to_string();
                let encoded = convert::encode_nuance_review(&review)?;
                table
                    .insert(key.as_str(), encoded.as_slice())
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
            txn.commit().map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn pending(&self, _project_id: &str) -> Result<Vec<NuanceReview>> {
        let db = Arc::clone(&self.db);
        self.with_db_timeout(move || {
            let txn = db.begin_read().map_err(|e| Error::Database(e.to_string()))?;
            let table = txn
                .open_table(NUANCE_TABLE)
                .map_err(|e| Error::Database(e.to_string()))?;
            let mut reviews = Vec::new();
            for entry in table.iter().map_err(|e| Error::Database(e.to_string()))? {
                let (_, value) = entry.map_err(|e| Error::Database(e.to_string()))?;
                let review = convert::decode_nuance_review(value.value())?;
                if review.status == memory_core::types::NuanceStatus::PendingReview {
                    reviews.push(review);
                }
            }
            Ok(reviews)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memory_core::types::{ArchivalReason, NuanceStatus};
    use uuid::Uuid;

    fn sample_item() -> WorkingMemoryItem {
        WorkingMemoryItem {
            id: Uuid::new_v4(),
            content: "hello".into(),
            importance: 0.5,
            last_accessed: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn persist_then_snapshot_round_trips() {
        let (store, _dir) = RedbStore::temp();
        let item = sample_item();
        store.persist("proj-a", vec![item.clone()]).await.expect("persist should succeed");

        let snapshot = store.snapshot("proj-a").await.expect("snapshot should succeed");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, item.id);
    }

    #[tokio::test]
    async fn persist_is_scoped_per_project() {
        let (store, _dir) = RedbStore::temp();
        store.persist("proj-a", vec![sample_item()]).await.unwrap();
        store.persist("proj-b", vec![sample_item()]).await.unwrap();

        assert_eq!(store.snapshot("proj-a").await.unwrap().len(), 1);
        assert_eq!(store.snapshot("proj-b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persist_replaces_prior_snapshot_for_project() {
        let (store, _dir) = RedbStore::temp();
        store.persist("proj-a", vec![sample_item()]).await.unwrap();
        store.persist("proj-a", vec![sample_item(), sample_item()]).await.unwrap();

        assert_eq!(store.snapshot("proj-a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn archive_and_list_stale_sorted_newest_first() {
        let (store, _dir) = RedbStore::temp();
        let older = StaleMemoryItem {
            id: Uuid::new_v4(),
            original_content: "old".into(),
            archived_at: Utc::now() - chrono::Duration::hours(1),
            importance: 0.2,
            reason: ArchivalReason::LruEviction,
        };
        let newer = StaleMemoryItem {
            id: Uuid::new_v4(),
            original_content: "new".into(),
            archived_at: Utc::now(),
            importance: 0.2,
            reason: ArchivalReason::ManualArchive,
        };
        store.archive("proj-a", older).await.unwrap();
        store.archive("proj-a", newer.clone()).await.unwrap();

        let stale = store.stale("proj-a", 10).await.unwrap();
        assert_eq!(stale[0].id, newer.id);
    }

    #[tokio::test]
    async fn nuance_pending_excludes_resolved_reviews() {
        let (store, _dir) = RedbStore::temp();
        let pending = NuanceReview {
            id: Uuid::new_v4(),
            status: NuanceStatus::PendingReview,
            edge_a: Uuid::new_v4(),
            edge_b: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let resolved = NuanceReview {
            id: Uuid::new_v4(),
            status: NuanceStatus::Resolved,
            edge_a: Uuid::new_v4(),
            edge_b: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        store.put(pending.clone()).await.unwrap();
        store.put(resolved).await.unwrap();

        let pending_only = store.pending("proj-a").await.unwrap();
        assert_eq!(pending_only.len(), 1);
        assert_eq!(pending_only[0].id, pending.id);
    }
}
