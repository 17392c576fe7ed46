// Adapters layer: concrete implementations for external systems (html source, chat api, storage).

pub mod html_source;
pub mod storage;
pub mod telegram;
