use crate::core::subscribers::SubscriberRegistry;
use crate::domain::model::ChatId;
use crate::domain::ports::Storage;
use std::sync::Arc;

pub const START_REPLY: &str =
    "Hi! I watch the listing page and message you when something new shows up. \
     Send /subscribe to start receiving listings and /unsubscribe to stop.";
pub const SUBSCRIBED_REPLY: &str = "You are now subscribed to new listings.";
pub const ALREADY_SUBSCRIBED_REPLY: &str = "You are already subscribed.";
pub const UNSUBSCRIBED_REPLY: &str = "You have unsubscribed from new listings.";
pub const NOT_SUBSCRIBED_REPLY: &str = "You were not subscribed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Subscribe,
    Unsubscribe,
}

impl Command {
    /// Accepts `/cmd`, `/cmd@SomeBot` and trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);

        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(Command::Start),
            "subscribe" => Some(Command::Subscribe),
            "unsubscribe" | "stop" => Some(Command::Unsubscribe),
            _ => None,
        }
    }
}

/// Applies inbound chat commands to the subscriber registry.
pub struct CommandHandler<S: Storage> {
    registry: Arc<SubscriberRegistry<S>>,
}

impl<S: Storage> CommandHandler<S> {
    pub fn new(registry: Arc<SubscriberRegistry<S>>) -> Self {
        Self { registry }
    }

    /// Reply text for `text` sent from `chat_id`, `None` if it is not a command.
    pub async fn handle(&self, chat_id: ChatId, text: &str) -> Option<&'static str> {
        let command = Command::parse(text)?;

        let reply = match command {
            Command::Start => START_REPLY,
            Command::Subscribe => {
                if self.registry.add(chat_id).await {
                    tracing::info!(chat_id = %chat_id, "New subscriber");
                    self.persist(chat_id).await;
                    SUBSCRIBED_REPLY
                } else {
                    ALREADY_SUBSCRIBED_REPLY
                }
            }
            Command::Unsubscribe => {
                if self.registry.remove(chat_id).await {
                    tracing::info!(chat_id = %chat_id, "Subscriber left");
                    self.persist(chat_id).await;
                    UNSUBSCRIBED_REPLY
                } else {
                    NOT_SUBSCRIBED_REPLY
                }
            }
        };

        Some(reply)
    }

    async fn persist(&self, chat_id: ChatId) {
        // 記憶體中的狀態仍然正確，下次成功寫入時補上
        if let Err(e) = self.registry.persist().await {
            tracing::error!(chat_id = %chat_id, error = %e, "Failed to persist subscribers");
        }
    }
}
