//! Telegram adapter: minimal Bot API client over HTTPS.
//!
//! Only the three calls the bot needs: long-polling `getUpdates`,
//! `sendMessage` and `sendDocument`.

use std::time::Duration;

use reqwest::{multipart, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const API_BASE: &str = "https://api.telegram.org";

/// Extra slack on top of the long-poll timeout before the HTTP client gives up.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Error type for Bot API calls.
///
/// HTTP errors are stripped of their URL, which embeds the bot token.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Bot API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

/// Bot token. `Debug` never prints the secret.
#[derive(Clone)]
pub struct BotToken(String);

impl BotToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BotToken([REDACTED])")
    }
}

/// Incoming update (only the fields the bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(
                self.description
                    .unwrap_or_else(|| "request failed without description".to_string()),
            )),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base: String,
}

impl TelegramClient {
    /// Build a client whose HTTP timeout covers the given long-poll timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(token: &BotToken, poll_timeout: Duration) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(poll_timeout + HTTP_TIMEOUT_SLACK)
            .build()?;
        Ok(Self {
            client,
            base: format!("{API_BASE}/bot{}", token.0),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Long-poll for updates after `offset`.
    ///
    /// # Errors
    /// Returns error on transport failure or an API-level rejection.
    pub async fn get_updates(&self, offset: Option<i64>, poll_timeout: Duration) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: poll_timeout.as_secs(),
                allowed_updates: ["message"],
            },
        )
        .await
    }

    /// Send a plain text message.
    ///
    /// # Errors
    /// Returns error on transport failure or an API-level rejection.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }

    /// Upload a file as a document.
    ///
    /// # Errors
    /// Returns error on transport failure or an API-level rejection.
    pub async fn send_document(&self, chat_id: i64, filename: &str, bytes: Vec<u8>) -> Result<(), TelegramError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(format!("{}/sendDocument", self.base))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        response.into_result().map(|_| ())
    }
}
