//! # relay-core
//!
//! Core types and traits for the keyword relay: keywords, inbound events, queue records and
//! message logs ([`types`]), the store traits the pipeline calls through ([`store`]), delivery
//! abstractions with a teloxide implementation ([`bot`]), errors, and tracing initialisation.

pub mod bot;
pub mod error;
pub mod logger;
pub mod store;
pub mod types;

pub use bot::{parse_chat_id, ChatNotifier, DeliveryChannel, TelegramBot, TELEGRAM_PLATFORM};
pub use error::{RelayError, Result, StoreError, StoreResult};
pub use logger::init_tracing;
pub use store::{
    DestinationStore, EmailOutbox, FeedStore, KeywordStore, LogStore, QueueStore, SettingsStore,
    SubscriptionStore, UserStore,
};
pub use types::{
    Destination, EmailOutboxEntry, FeedEntry, FeedbackSignal, InboundChat, InboundEvent,
    InboundMessage, Keyword, LogStatus, MatchMode, MatchResult, MediaKind, MessageLog,
    MonitoredChannel, NewMessageLog, NewQueueRecord, QueueRecord, QueueStatus, QueueTransition,
    ToInboundEvent, UserProfile,
};
