use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Fetching {url} failed: {message}")]
    FetchError { url: String, message: String },

    #[error("Unexpected page structure: {message}")]
    ParseError { message: String },

    #[error("Persisting '{key}' failed: {message}")]
    PersistError { key: String, message: String },

    #[error("Delivery to chat {chat_id} failed: {message}")]
    DeliveryError { chat_id: i64, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Parsing,
    Storage,
    Delivery,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WatchError::ConfigError { .. }
            | WatchError::MissingConfigError { .. }
            | WatchError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            WatchError::HttpError(_) | WatchError::FetchError { .. } => ErrorCategory::Network,
            WatchError::ParseError { .. } => ErrorCategory::Parsing,
            WatchError::PersistError { .. } | WatchError::IoError(_) => ErrorCategory::Storage,
            WatchError::DeliveryError { .. } => ErrorCategory::Delivery,
            WatchError::SerializationError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Storage | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::Delivery => ErrorSeverity::Medium,
            ErrorCategory::Parsing => ErrorSeverity::Low,
        }
    }

    /// 只有配置錯誤會讓程序停止，其餘錯誤在週期邊界被攔下
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            WatchError::MissingConfigError { .. } => {
                "Set the missing environment variable or pass the matching command line flag"
            }
            WatchError::InvalidConfigValueError { .. } | WatchError::ConfigError { .. } => {
                "Check the configured value and restart"
            }
            WatchError::HttpError(_) | WatchError::FetchError { .. } => {
                "The source site may be down or blocking requests; the next cycle will retry"
            }
            WatchError::ParseError { .. } => {
                "The page layout may have changed; review the selectors file"
            }
            WatchError::PersistError { .. } | WatchError::IoError(_) => {
                "Check free disk space and permissions of the state directory"
            }
            WatchError::DeliveryError { .. } => {
                "The chat may have blocked the bot or hit a rate limit; other chats are unaffected"
            }
            WatchError::SerializationError(_) => "Inspect the persisted state files for corruption",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            WatchError::MissingConfigError { field } => {
                format!("Required setting {} is not set", field)
            }
            WatchError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting {} is invalid: {}", field, reason)
            }
            WatchError::ConfigError { message } => format!("Configuration problem: {}", message),
            WatchError::FetchError { url, .. } => format!("Could not download {}", url),
            WatchError::HttpError(_) => "A network request failed".to_string(),
            WatchError::ParseError { .. } => "The listing page could not be understood".to_string(),
            WatchError::PersistError { key, .. } => format!("Could not save {}", key),
            WatchError::DeliveryError { chat_id, .. } => {
                format!("Could not deliver a message to chat {}", chat_id)
            }
            WatchError::IoError(e) => format!("File system error: {}", e),
            WatchError::SerializationError(e) => format!("Data format error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_are_fatal() {
        let missing = WatchError::MissingConfigError {
            field: "BOT_TOKEN".to_string(),
        };
        assert!(missing.is_fatal());
        assert_eq!(missing.severity(), ErrorSeverity::Critical);

        let fetch = WatchError::FetchError {
            url: "https://example.com".to_string(),
            message: "timeout".to_string(),
        };
        assert!(!fetch.is_fatal());
        assert_eq!(fetch.category(), ErrorCategory::Network);

        let delivery = WatchError::DeliveryError {
            chat_id: 42,
            message: "Forbidden: bot was blocked by the user".to_string(),
        };
        assert!(!delivery.is_fatal());
        assert!(delivery.to_string().contains("42"));
    }

    #[test]
    fn test_user_friendly_message_names_the_field() {
        let err = WatchError::MissingConfigError {
            field: "BOT_TOKEN".to_string(),
        };
        assert!(err.user_friendly_message().contains("BOT_TOKEN"));
    }
}
