//! # relay-telegram
//!
//! Telegram transport for the relay: teloxide message adapter, minimal config, dispatcher loop.
//! Only connectivity and event conversion live here; matching and delivery are in `pipeline`.

mod adapters;
mod config;
mod runner;

pub use adapters::{inbound_from_parts, TelegramMessageWrapper};
pub use config::TelegramConfig;
pub use runner::run_dispatcher;
