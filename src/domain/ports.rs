use crate::domain::model::{ChatId, CycleReport, Listing};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Key/value byte storage backing the persisted sets.
///
/// `write_file` must replace the previous value atomically: a failed write
/// leaves whatever was stored before readable.
pub trait Storage: Send + Sync + 'static {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Current listings on the remote page, deduplicated by id.
    async fn fetch(&self) -> Result<Vec<Listing>>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<()>;
}

/// One unit of scheduled work.
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    async fn run_cycle(&self) -> Result<CycleReport>;
}
