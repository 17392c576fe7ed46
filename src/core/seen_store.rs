use crate::core::persistent_set::PersistentSet;
use crate::domain::model::Listing;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::collections::HashSet;

pub const SEEN_KEY: &str = "seen.json";

/// Listing ids already notified about. Grows monotonically.
///
/// `add_all` only touches memory; nothing is durable until `persist`
/// returns. A crash in between means the next process re-notifies the
/// batch (at-least-once delivery).
pub struct SeenStore<S: Storage> {
    ids: PersistentSet<String, S>,
}

impl<S: Storage> SeenStore<S> {
    pub async fn load(storage: S) -> Self {
        Self {
            ids: PersistentSet::load(storage, SEEN_KEY).await,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.ids.contains(&id.to_string()).await
    }

    /// Listings whose id has not been seen yet, page order preserved.
    pub async fn unseen(&self, listings: &[Listing]) -> Vec<Listing> {
        let ids: Vec<String> = listings.iter().map(|l| l.id.clone()).collect();
        let missing = self.ids.missing(&ids).await;
        let missing: HashSet<&str> = missing.iter().map(String::as_str).collect();
        listings
            .iter()
            .filter(|l| missing.contains(l.id.as_str()))
            .cloned()
            .collect()
    }

    pub async fn add_all<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = String> + Send,
    {
        self.ids.extend(ids).await
    }

    pub async fn all(&self) -> Vec<String> {
        self.ids.snapshot().await
    }

    pub async fn len(&self) -> usize {
        self.ids.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.is_empty().await
    }

    pub async fn persist(&self) -> Result<()> {
        self.ids.persist().await
    }

    /// Writes ids added since the last successful persist, if any.
    pub async fn persist_if_dirty(&self) -> Result<bool> {
        self.ids.persist_if_dirty().await
    }
}
