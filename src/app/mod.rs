pub mod commands;
pub mod poller;
