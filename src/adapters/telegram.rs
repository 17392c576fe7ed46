use crate::domain::model::ChatId;
use crate::domain::ports::Notifier;
use crate::utils::error::{Result, WatchError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Minimal Bot API client: just what notification and command polling need.
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(75))
            .build()
            .map_err(|e| WatchError::ConfigError {
                message: format!("Cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let delivery_error = |message: String| WatchError::DeliveryError {
            chat_id: chat_id.0,
            message,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest {
                chat_id: chat_id.0,
                text,
                disable_web_page_preview: false,
            })
            .send()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| delivery_error(format!("HTTP status {}: {}", status, e)))?;

        if !status.is_success() || !body.ok {
            return Err(delivery_error(
                body.description
                    .unwrap_or_else(|| format!("HTTP status {}", status)),
            ));
        }

        Ok(())
    }

    /// Long-polls for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .json(&GetUpdatesRequest {
                offset,
                timeout: timeout.as_secs(),
                allowed_updates: vec!["message"],
            })
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse<Vec<Update>> = response.json().await?;

        if !status.is_success() || !body.ok {
            return Err(WatchError::FetchError {
                url: "getUpdates".to_string(),
                message: body
                    .description
                    .unwrap_or_else(|| format!("HTTP status {}", status)),
            });
        }

        Ok(body.result.unwrap_or_default())
    }
}

#[derive(Clone)]
pub struct TelegramNotifier {
    api: TelegramApi,
}

impl TelegramNotifier {
    pub fn new(api: TelegramApi) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.api.send_message(chat_id, text).await
    }
}
