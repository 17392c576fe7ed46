pub mod dispatcher;
pub mod engine;
pub mod persistent_set;
pub mod scheduler;
pub mod seen_store;
pub mod subscribers;

pub use crate::domain::model::{ChatId, CycleReport, DeliveryReport, Listing};
pub use crate::domain::ports::{Cycle, ListingSource, Notifier, Storage};
pub use crate::utils::error::Result;
