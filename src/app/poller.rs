use crate::adapters::telegram::{TelegramApi, Update};
use crate::app::commands::CommandHandler;
use crate::domain::model::ChatId;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::time::Duration;
use tokio::sync::watch;

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(50);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Long-polls the Bot API for commands and answers them.
pub struct CommandPoller<S: Storage> {
    api: TelegramApi,
    handler: CommandHandler<S>,
    offset: i64,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl<S: Storage> CommandPoller<S> {
    pub fn new(api: TelegramApi, handler: CommandHandler<S>) -> Self {
        Self {
            api,
            handler,
            offset: 0,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// One `getUpdates` round. Returns how many commands were answered.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self.api.get_updates(self.offset, self.poll_timeout).await?;
        Ok(self.handle_updates(updates).await)
    }

    /// Applies and answers a batch of updates. Not meant to be cancelled
    /// halfway: a registry change is only safe once it has been persisted.
    async fn handle_updates(&mut self, updates: Vec<Update>) -> usize {
        let mut answered = 0;

        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text.as_deref() else {
                continue;
            };

            let chat_id = ChatId(message.chat.id);
            if let Some(reply) = self.handler.handle(chat_id, text).await {
                answered += 1;
                if let Err(e) = self.api.send_message(chat_id, reply).await {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Failed to answer command");
                }
            }
        }

        answered
    }

    /// Only the long-poll wait is raced against shutdown. Updates already
    /// received are handled to the end before the loop looks at it again.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("🤖 Command polling started");
        let retry_delay = self.retry_delay;

        while !*shutdown.borrow() {
            let polled = tokio::select! {
                result = self.api.get_updates(self.offset, self.poll_timeout) => result,
                _ = shutdown.changed() => break,
            };

            match polled {
                Ok(updates) => {
                    self.handle_updates(updates).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Polling for commands failed, retrying in {:?}", retry_delay);
                    tokio::select! {
                        _ = tokio::time::sleep(retry_delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        tracing::info!("Command polling stopped");
    }
}
