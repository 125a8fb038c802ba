//! Delivery abstractions for sending formatted matches.
//!
//! [`DeliveryChannel`] forwards to a configured destination; [`ChatNotifier`] pings the user's
//! own linked chat. [`TelegramBot`] implements both via teloxide.

use crate::error::{RelayError, Result};
use crate::types::Destination;
use async_trait::async_trait;
use teloxide::{prelude::*, types::ChatId};

/// Platform name of destinations handled by [`TelegramBot`].
pub const TELEGRAM_PLATFORM: &str = "telegram";

/// Sends to one destination; each call is independently failable.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Sends `text` to the destination and returns the platform message id.
    async fn send(&self, destination: &Destination, text: &str) -> Result<String>;
}

/// Sends a direct notification to a user's linked chat.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify_chat(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Parses a destination chat id (Telegram numeric id, possibly negative for channels).
pub fn parse_chat_id(s: &str) -> Result<i64> {
    s.trim()
        .parse()
        .map_err(|_| RelayError::Config(format!("Invalid chat_id for destination: {}", s)))
}

/// Teloxide-based implementation of [`DeliveryChannel`] and [`ChatNotifier`].
#[derive(Clone)]
pub struct TelegramBot {
    bot: teloxide::Bot,
}

impl TelegramBot {
    /// Creates a bot using the given Telegram bot token.
    pub fn new(token: String) -> Self {
        Self {
            bot: teloxide::Bot::new(token),
        }
    }

    /// Wraps an already configured teloxide bot (e.g. with a custom API URL).
    pub fn from_bot(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl DeliveryChannel for TelegramBot {
    async fn send(&self, destination: &Destination, text: &str) -> Result<String> {
        if destination.platform != TELEGRAM_PLATFORM {
            return Err(RelayError::Config(format!(
                "Unsupported destination platform: {}",
                destination.platform
            )));
        }
        let chat_id = parse_chat_id(&destination.chat_id)?;
        let sent = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;
        Ok(sent.id.to_string())
    }
}

#[async_trait]
impl ChatNotifier for TelegramBot {
    async fn notify_chat(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;
        Ok(())
    }
}
