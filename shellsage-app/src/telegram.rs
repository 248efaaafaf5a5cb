use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use shellsage_executor::Messenger;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

/// Thin Bot API client: long-poll `getUpdates` plus `sendMessage` with
/// Markdown parse mode.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Self {
        Self::with_base_url(format!("https://api.telegram.org/bot{}", bot_token))
    }

    /// Point at a different endpoint, for tests.
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let url = format!("{}/getUpdates", self.base_url);
        let body = json!({ "offset": offset, "timeout": timeout_secs });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(format!("{}: {}", status, text)));
        }

        let parsed: UpdatesResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        if !parsed.ok {
            return Err(TransportError::Api(
                parsed.description.unwrap_or_else(|| "not ok".to_string()),
            ));
        }
        Ok(parsed.result)
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        let url = format!("{}/sendMessage", self.base_url);
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(format!("{}: {}", status, text)));
        }
        Ok(())
    }
}

/// Fire-and-forget delivery into a chat. Failures are logged and swallowed:
/// a dropped notification must never unwind the execution flow.
pub struct TelegramMessenger {
    client: Arc<TelegramClient>,
}

impl TelegramMessenger {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, session_id: &str, text: &str) {
        if let Err(e) = self.client.send_message(session_id, text).await {
            tracing::warn!(session_id, error = %e, "failed to deliver message");
        }
    }
}
