use crate::core::dispatcher::NotificationDispatcher;
use crate::core::seen_store::SeenStore;
use crate::core::subscribers::SubscriberRegistry;
use crate::domain::model::CycleReport;
use crate::domain::ports::{Cycle, ListingSource, Notifier, Storage};
use crate::utils::error::Result;
use chrono::Utc;
use std::sync::Arc;

/// Runs one fetch, diff, notify, persist pass.
pub struct WatchEngine<L: ListingSource, N: Notifier, S: Storage> {
    source: L,
    dispatcher: NotificationDispatcher<N>,
    seen: Arc<SeenStore<S>>,
    subscribers: Arc<SubscriberRegistry<S>>,
    skip_without_subscribers: bool,
}

impl<L: ListingSource, N: Notifier, S: Storage> WatchEngine<L, N, S> {
    pub fn new(
        source: L,
        dispatcher: NotificationDispatcher<N>,
        seen: Arc<SeenStore<S>>,
        subscribers: Arc<SubscriberRegistry<S>>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            seen,
            subscribers,
            skip_without_subscribers: false,
        }
    }

    /// Skip the whole cycle, fetch included, while nobody is subscribed.
    pub fn with_skip_without_subscribers(mut self, skip: bool) -> Self {
        self.skip_without_subscribers = skip;
        self
    }

    pub fn seen(&self) -> &Arc<SeenStore<S>> {
        &self.seen
    }

    pub async fn run(&self) -> Result<CycleReport> {
        let mut report = CycleReport::new(Utc::now());

        let subscribers = self.subscribers.all().await;
        if subscribers.is_empty() {
            if self.skip_without_subscribers {
                tracing::info!("No subscribers, skipping this cycle");
                report.skipped = true;
                report.seen_total = self.seen.len().await;
                self.retry_pending_persist().await?;
                return Ok(report);
            }
            tracing::info!("No subscribers, new listings will only be marked as seen");
        }

        // Fetch
        let fetched = self.source.fetch().await?;
        report.fetched = fetched.len();

        // Diff
        let new_listings = self.seen.unseen(&fetched).await;
        report.new_listings = new_listings.len();
        tracing::info!(
            "🔎 Fetched {} listings, {} new",
            report.fetched,
            report.new_listings
        );

        if new_listings.is_empty() {
            report.seen_total = self.seen.len().await;
            self.retry_pending_persist().await?;
            return Ok(report);
        }

        // Notify
        report.delivery = self.dispatcher.broadcast(&new_listings, &subscribers).await;

        // Persist
        self.seen
            .add_all(new_listings.into_iter().map(|l| l.id))
            .await;
        report.seen_total = self.seen.len().await;
        self.seen.persist().await?;

        Ok(report)
    }

    /// A previous cycle may have failed to persist ids it already notified about.
    async fn retry_pending_persist(&self) -> Result<()> {
        if self.seen.persist_if_dirty().await? {
            tracing::info!("💾 Persisted seen ids left over from an earlier failed write");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<L, N, S> Cycle for WatchEngine<L, N, S>
where
    L: ListingSource + 'static,
    N: Notifier + 'static,
    S: Storage,
{
    async fn run_cycle(&self) -> Result<CycleReport> {
        self.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::domain::model::{ChatId, Listing};
    use crate::utils::error::WatchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct StaticSource {
        listings: Vec<Listing>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(ids: &[&str]) -> Self {
            Self {
                listings: ids
                    .iter()
                    .map(|id| Listing::new(*id, format!("https://example.com/{}", id)))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ListingSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<Listing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.listings.clone())
        }
    }

    #[derive(Clone, Default)]
    struct CountingNotifier {
        sent: Arc<Mutex<Vec<(ChatId, String)>>>,
    }

    #[async_trait::async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, chat_id: ChatId, text: &str) -> Result<()> {
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    async fn engine(
        source: StaticSource,
        notifier: CountingNotifier,
        storage: MemoryStorage,
        chats: &[i64],
    ) -> WatchEngine<StaticSource, CountingNotifier, MemoryStorage> {
        let seen = Arc::new(SeenStore::load(storage.clone()).await);
        let subscribers = Arc::new(SubscriberRegistry::load(storage).await);
        for chat in chats {
            subscribers.add(ChatId(*chat)).await;
        }
        let dispatcher = NotificationDispatcher::new(notifier).with_pacing(Duration::ZERO);
        WatchEngine::new(source, dispatcher, seen, subscribers)
    }

    #[tokio::test]
    async fn test_second_run_sends_nothing() {
        let notifier = CountingNotifier::default();
        let engine = engine(
            StaticSource::new(&["L1", "L2"]),
            notifier.clone(),
            MemoryStorage::new(),
            &[1],
        )
        .await;

        let first = engine.run().await.unwrap();
        let second = engine.run().await.unwrap();

        assert_eq!(first.new_listings, 2);
        assert_eq!(second.new_listings, 0);
        assert_eq!(second.delivery.attempted, 0);
        assert_eq!(notifier.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_skip_policy_does_not_fetch() {
        let source = StaticSource::new(&["L1"]);
        let engine = engine(source, CountingNotifier::default(), MemoryStorage::new(), &[])
            .await
            .with_skip_without_subscribers(true);

        let report = engine.run().await.unwrap();

        assert!(report.skipped);
        assert_eq!(engine.source.calls.load(Ordering::SeqCst), 0);
        assert!(engine.seen().is_empty().await);
    }

    #[tokio::test]
    async fn test_without_subscribers_listings_are_still_marked_seen() {
        let notifier = CountingNotifier::default();
        let engine = engine(
            StaticSource::new(&["L1"]),
            notifier.clone(),
            MemoryStorage::new(),
            &[],
        )
        .await;

        let report = engine.run().await.unwrap();

        assert_eq!(report.delivery.attempted, 0);
        assert!(engine.seen().contains("L1").await);
        assert!(notifier.sent.lock().await.is_empty());
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl ListingSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<Listing>> {
            Err(WatchError::FetchError {
                url: "https://example.com".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_seen_set_untouched() {
        let storage = MemoryStorage::new();
        let seen = Arc::new(SeenStore::load(storage.clone()).await);
        seen.add_all(["L0".to_string()]).await;
        let subscribers = Arc::new(SubscriberRegistry::load(storage).await);
        subscribers.add(ChatId(1)).await;
        let engine = WatchEngine::new(
            FailingSource,
            NotificationDispatcher::new(CountingNotifier::default()),
            seen.clone(),
            subscribers,
        );

        let result = engine.run_cycle().await;

        assert!(matches!(result, Err(WatchError::FetchError { .. })));
        assert_eq!(seen.all().await, vec!["L0".to_string()]);
    }

    #[derive(Clone, Default)]
    struct ReadOnlyStorage {
        inner: MemoryStorage,
    }

    impl Storage for ReadOnlyStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.inner.read_file(path).await
        }

        async fn write_file(&self, _path: &str, _data: &[u8]) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem").into())
        }
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_in_memory_state() {
        let storage = ReadOnlyStorage::default();
        let seen = Arc::new(SeenStore::load(storage.clone()).await);
        let subscribers = Arc::new(SubscriberRegistry::load(storage).await);
        subscribers.add(ChatId(1)).await;
        let notifier = CountingNotifier::default();
        let engine = WatchEngine::new(
            StaticSource::new(&["L1"]),
            NotificationDispatcher::new(notifier.clone()).with_pacing(Duration::ZERO),
            seen.clone(),
            subscribers,
        );

        let first = engine.run().await;
        assert!(matches!(first, Err(WatchError::PersistError { .. })));

        // 已經送出的不會再送一次，補寫仍然失敗
        let second = engine.run().await;
        assert!(matches!(second, Err(WatchError::PersistError { .. })));
        assert!(seen.contains("L1").await);
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[derive(Clone, Default)]
    struct RecoveringStorage {
        inner: MemoryStorage,
        failures_left: Arc<AtomicUsize>,
    }

    impl Storage for RecoveringStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.inner.read_file(path).await
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.write_file(path, data).await
        }
    }

    #[tokio::test]
    async fn test_failed_persist_is_retried_when_nothing_is_new() {
        let storage = RecoveringStorage::default();
        let seen = Arc::new(SeenStore::load(storage.clone()).await);
        let subscribers = Arc::new(SubscriberRegistry::load(storage.clone()).await);
        subscribers.add(ChatId(1)).await;
        let notifier = CountingNotifier::default();
        let engine = WatchEngine::new(
            StaticSource::new(&["L1"]),
            NotificationDispatcher::new(notifier.clone()).with_pacing(Duration::ZERO),
            seen,
            subscribers,
        );

        storage.failures_left.store(1, Ordering::SeqCst);
        let first = engine.run().await;
        assert!(matches!(first, Err(WatchError::PersistError { .. })));
        assert!(storage.inner.get_file("seen.json").await.is_none());

        // 磁碟恢復後，沒有新物件的週期也會補寫
        let second = engine.run().await.unwrap();
        assert_eq!(second.new_listings, 0);
        let bytes = storage.inner.get_file("seen.json").await.unwrap();
        let stored: Vec<String> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored, vec!["L1".to_string()]);
        assert_eq!(notifier.sent.lock().await.len(), 1);

        let restarted = SeenStore::load(storage).await;
        assert!(restarted.contains("L1").await);
    }
}
