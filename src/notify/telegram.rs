use super::Notifier;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

/// Sends messages to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: SecretString,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, chat_id: i64, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::utils::http_client(timeout)?,
            api_base: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        })
    }

    /// Points the client at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }
}

/// Messages are plain text; error strings may contain `<`, which the HTML
/// parse mode would otherwise reject.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let text = escape_html(message);
        let body = SendMessageBody {
            chat_id: self.chat_id,
            text: &text,
            parse_mode: "HTML",
        };
        let res = self.client.post(self.endpoint()).json(&body).send().await?;
        if res.status() != StatusCode::OK {
            return Err(AppError::Status {
                endpoint: "telegram",
                status: res.status().as_u16(),
            });
        }
        debug!(len = message.len(), "[NOTIFY] telegram message delivered");
        Ok(())
    }
}
