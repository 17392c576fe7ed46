pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::html_source::HtmlListingSource;
pub use adapters::storage::{LocalStorage, MemoryStorage};
pub use adapters::telegram::{TelegramApi, TelegramNotifier};
pub use app::commands::CommandHandler;
pub use app::poller::CommandPoller;
pub use config::SelectorConfig;
pub use core::{
    dispatcher::NotificationDispatcher,
    engine::WatchEngine,
    scheduler::{Scheduler, SchedulerHandle, SchedulerState},
    seen_store::SeenStore,
    subscribers::SubscriberRegistry,
};
pub use utils::error::{Result, WatchError};
