#[cfg(feature = "cli")]
pub mod cli;
pub mod selectors;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use selectors::SelectorConfig;
