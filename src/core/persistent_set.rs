use crate::domain::ports::Storage;
use crate::utils::error::{Result, WatchError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Lock-guarded set persisted as a JSON array under one storage key.
///
/// The lock is held across the snapshot *and* the write in `persist`, so two
/// persists can never land out of order and a reader never sees a half
/// applied mutation.
///
/// Mutations mark the set dirty until a persist succeeds, so a write that
/// failed once is retried by the next `persist_if_dirty`.
pub struct PersistentSet<T, S> {
    storage: S,
    key: String,
    items: Mutex<HashSet<T>>,
    dirty: AtomicBool,
}

impl<T, S> PersistentSet<T, S>
where
    T: Eq + Hash + Ord + Clone + Serialize + DeserializeOwned + Send + Sync,
    S: Storage,
{
    /// Never fails: missing, unreadable or corrupt state loads as empty.
    pub async fn load(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let items = match storage.read_file(&key).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<T>>(&bytes) {
                Ok(items) => {
                    tracing::info!(key = %key, count = items.len(), "Loaded persisted state");
                    items.into_iter().collect()
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Persisted state is corrupt, starting empty");
                    HashSet::new()
                }
            },
            Err(WatchError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(key = %key, "No persisted state yet, starting empty");
                HashSet::new()
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Persisted state unreadable, starting empty");
                HashSet::new()
            }
        };

        Self {
            storage,
            key,
            items: Mutex::new(items),
            dirty: AtomicBool::new(false),
        }
    }

    pub async fn contains(&self, item: &T) -> bool {
        self.items.lock().await.contains(item)
    }

    pub async fn insert(&self, item: T) -> bool {
        let mut guard = self.items.lock().await;
        let inserted = guard.insert(item);
        if inserted {
            self.dirty.store(true, Ordering::SeqCst);
        }
        inserted
    }

    pub async fn remove(&self, item: &T) -> bool {
        let mut guard = self.items.lock().await;
        let removed = guard.remove(item);
        if removed {
            self.dirty.store(true, Ordering::SeqCst);
        }
        removed
    }

    /// Returns how many items were not present before.
    pub async fn extend<I: IntoIterator<Item = T> + Send>(&self, items: I) -> usize {
        let mut guard = self.items.lock().await;
        let before = guard.len();
        guard.extend(items);
        let added = guard.len() - before;
        if added > 0 {
            self.dirty.store(true, Ordering::SeqCst);
        }
        added
    }

    /// Items of `candidates` not yet in the set, in the order given.
    pub async fn missing<'a>(&self, candidates: impl IntoIterator<Item = &'a T> + Send) -> Vec<T>
    where
        T: 'a,
    {
        let guard = self.items.lock().await;
        candidates
            .into_iter()
            .filter(|item| !guard.contains(*item))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Sorted copy of the current contents.
    pub async fn snapshot(&self) -> Vec<T> {
        let guard = self.items.lock().await;
        let mut items: Vec<T> = guard.iter().cloned().collect();
        items.sort();
        items
    }

    /// True while the in-memory set holds changes no persist has written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Persists only when there are unwritten changes. Returns whether it wrote.
    pub async fn persist_if_dirty(&self) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    pub async fn persist(&self) -> Result<()> {
        let guard = self.items.lock().await;
        let mut items: Vec<&T> = guard.iter().collect();
        items.sort();

        let data = serde_json::to_vec_pretty(&items)?;
        self.storage
            .write_file(&self.key, &data)
            .await
            .map_err(|e| WatchError::PersistError {
                key: self.key.clone(),
                message: e.to_string(),
            })?;
        // 仍持有鎖，期間不會有新的變更
        self.dirty.store(false, Ordering::SeqCst);

        tracing::debug!(key = %self.key, count = items.len(), "Persisted state");
        Ok(())
    }
}
