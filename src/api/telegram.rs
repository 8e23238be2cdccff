use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TelegramConfig;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Telegram API error {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Thin client over the Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(http_client: Client, config: TelegramConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.bot_token.is_some()
    }

    pub fn admin_chat_id(&self) -> Option<i64> {
        self.config.admin_chat_id
    }

    /// Send `text` to `chat_id`. Returns `Ok(false)` when no bot token is
    /// configured and nothing was sent.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<bool, TelegramError> {
        let Some(token) = &self.config.bot_token else {
            debug!("Telegram bot token not configured, skipping message to {}", chat_id);
            return Ok(false);
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            token
        );
        let response = self
            .http_client
            .post(url)
            .timeout(self.config.timeout)
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(true)
    }

    /// Send without propagating failures. Notifications must never fail the
    /// request that triggered them.
    pub async fn notify(&self, chat_id: Option<i64>, text: &str) {
        let Some(chat_id) = chat_id else {
            return;
        };
        if let Err(err) = self.send_message(chat_id, text).await {
            warn!("Failed to send Telegram message to {}: {}", chat_id, err);
        }
    }
}

pub fn new_order_message(
    order_id: i32,
    user_name: Option<&str>,
    stall_name: &str,
    total_amount: f64,
) -> String {
    format!(
        "New order #{} from {} - {} - ₹{:.2}",
        order_id,
        user_name.unwrap_or("a student"),
        stall_name,
        total_amount
    )
}

pub fn order_approved_message(order_id: i32, estimated_time: Option<i32>) -> String {
    let mut message = format!("Your order #{} has been approved!", order_id);
    if let Some(minutes) = estimated_time {
        message.push_str(&format!(" It will be ready in {} minutes.", minutes));
    }
    message
}

pub fn order_rejected_message(order_id: i32, reason: &str) -> String {
    format!("Your order #{} was rejected. Reason: {}", order_id, reason)
}

pub fn order_ready_message(order_id: i32, stall_name: &str) -> String {
    format!("Your order #{} is ready for pickup at {}!", order_id, stall_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_message_formats_amount() {
        assert_eq!(
            new_order_message(17, Some("Asha"), "Dosa Corner", 120.5),
            "New order #17 from Asha - Dosa Corner - ₹120.50"
        );
        assert_eq!(
            new_order_message(18, None, "Juice Bar", 40.0),
            "New order #18 from a student - Juice Bar - ₹40.00"
        );
    }

    #[test]
    fn approved_message_mentions_estimate_only_when_given() {
        assert_eq!(
            order_approved_message(3, None),
            "Your order #3 has been approved!"
        );
        assert_eq!(
            order_approved_message(3, Some(15)),
            "Your order #3 has been approved! It will be ready in 15 minutes."
        );
    }

    #[test]
    fn status_messages() {
        assert_eq!(
            order_rejected_message(9, "Out of paneer"),
            "Your order #9 was rejected. Reason: Out of paneer"
        );
        assert_eq!(
            order_ready_message(9, "Dosa Corner"),
            "Your order #9 is ready for pickup at Dosa Corner!"
        );
    }

    #[tokio::test]
    async fn disabled_client_sends_nothing() {
        let client = TelegramClient::new(Client::new(), TelegramConfig::default());
        assert!(!client.is_enabled());
        assert!(!client.send_message(1, "hello").await.unwrap());
    }
}
