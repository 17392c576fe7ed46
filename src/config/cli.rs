use crate::domain::model::ChatId;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_existing_file, validate_non_empty_string, validate_range, validate_required_field,
    validate_state_dir, validate_url, Validate,
};
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Parser)]
#[command(name = "listing-watch")]
#[command(about = "Watches a listing page and notifies subscribed chats about new listings")]
pub struct CliConfig {
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    #[arg(long, env = "SOURCE_URL")]
    pub source_url: Option<String>,

    #[arg(long, env = "TARGET_CHAT_ID", allow_hyphen_values = true)]
    pub target_chat_id: Option<i64>,

    #[arg(long, env = "CHECK_INTERVAL_SECONDS", default_value = "120")]
    pub check_interval_seconds: u64,

    #[arg(long, env = "STATE_DIR", default_value = "./state")]
    pub state_dir: String,

    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value = "20")]
    pub request_timeout_seconds: u64,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    #[arg(long, env = "SELECTORS_FILE", help = "TOML file describing where listings sit in the page")]
    pub selectors_file: Option<String>,

    #[arg(long, help = "Keep state in memory only (lost on restart)")]
    pub in_memory: bool,

    #[arg(long, help = "Skip cycles entirely while nobody is subscribed")]
    pub skip_without_subscribers: bool,

    #[arg(long, help = "Do not poll for /subscribe and /unsubscribe commands")]
    pub no_commands: bool,

    #[arg(long, help = "Run a single cycle and exit")]
    pub once: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    pub fn bot_token(&self) -> Result<&str> {
        validate_required_field("BOT_TOKEN", &self.bot_token).map(String::as_str)
    }

    pub fn source_url(&self) -> Result<&str> {
        validate_required_field("SOURCE_URL", &self.source_url).map(String::as_str)
    }

    pub fn target_chat(&self) -> Option<ChatId> {
        self.target_chat_id.map(ChatId)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        let token = self.bot_token()?;
        validate_non_empty_string("BOT_TOKEN", token)?;

        let source_url = self.source_url()?;
        validate_url("SOURCE_URL", source_url)?;

        validate_url("TELEGRAM_API_URL", &self.telegram_api_url)?;
        validate_range(
            "CHECK_INTERVAL_SECONDS",
            self.check_interval_seconds,
            10,
            86_400,
        )?;
        validate_range(
            "REQUEST_TIMEOUT_SECONDS",
            self.request_timeout_seconds,
            1,
            300,
        )?;
        validate_non_empty_string("USER_AGENT", &self.user_agent)?;

        if !self.in_memory {
            validate_state_dir("STATE_DIR", &self.state_dir)?;
        }
        if let Some(path) = &self.selectors_file {
            validate_existing_file("SELECTORS_FILE", path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::WatchError;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["listing-watch"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_missing_token_is_a_missing_config_error() {
        let mut config = parse(&["--source-url", "https://example.com/listings"]);
        config.bot_token = None;

        match config.validate() {
            Err(WatchError::MissingConfigError { field }) => assert_eq!(field, "BOT_TOKEN"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_valid_flags() {
        let config = parse(&[
            "--bot-token",
            "123:abc",
            "--source-url",
            "https://example.com/listings",
            "--target-chat-id",
            "-100123",
            "--check-interval-seconds",
            "300",
        ]);

        assert!(config.validate().is_ok());
        assert_eq!(config.target_chat(), Some(ChatId(-100123)));
        assert_eq!(config.check_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_interval_out_of_range() {
        let config = parse(&[
            "--bot-token",
            "123:abc",
            "--source-url",
            "https://example.com/listings",
            "--check-interval-seconds",
            "1",
        ]);

        assert!(matches!(
            config.validate(),
            Err(WatchError::InvalidConfigValueError { .. })
        ));
    }
}
