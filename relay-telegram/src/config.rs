//! Telegram connection settings: bot token and optional Bot API URL.
//! Loaded from BOT_TOKEN and TELEGRAM_API_URL (or TELOXIDE_API_URL).

use anyhow::{Context, Result};
use reqwest::Url;
use std::env;

pub struct TelegramConfig {
    pub bot_token: String,
    pub telegram_api_url: Option<Url>,
}

impl TelegramConfig {
    /// `token` overrides BOT_TOKEN. The API URL must parse if set.
    pub fn from_env(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?,
        };
        if bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| {
                Url::parse(url.trim()).with_context(|| format!("Invalid Telegram API URL: {}", url))
            })
            .transpose()?;
        Ok(Self {
            bot_token,
            telegram_api_url,
        })
    }

    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            telegram_api_url: None,
        }
    }

    /// teloxide bot for this configuration.
    pub fn build_bot(&self) -> teloxide::Bot {
        let bot = teloxide::Bot::new(self.bot_token.clone());
        match &self.telegram_api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        }
    }
}
