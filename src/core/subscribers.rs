use crate::core::persistent_set::PersistentSet;
use crate::domain::model::ChatId;
use crate::domain::ports::Storage;
use crate::utils::error::Result;

pub const SUBSCRIBERS_KEY: &str = "subscribers.json";

/// Chats that receive new-listing notifications.
pub struct SubscriberRegistry<S: Storage> {
    chats: PersistentSet<ChatId, S>,
}

impl<S: Storage> SubscriberRegistry<S> {
    pub async fn load(storage: S) -> Self {
        Self {
            chats: PersistentSet::load(storage, SUBSCRIBERS_KEY).await,
        }
    }

    /// `false` when the chat was already subscribed.
    pub async fn add(&self, chat_id: ChatId) -> bool {
        self.chats.insert(chat_id).await
    }

    /// `false` when the chat was not subscribed.
    pub async fn remove(&self, chat_id: ChatId) -> bool {
        self.chats.remove(&chat_id).await
    }

    pub async fn contains(&self, chat_id: ChatId) -> bool {
        self.chats.contains(&chat_id).await
    }

    pub async fn all(&self) -> Vec<ChatId> {
        self.chats.snapshot().await
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.is_empty().await
    }

    pub async fn persist(&self) -> Result<()> {
        self.chats.persist().await
    }
}
