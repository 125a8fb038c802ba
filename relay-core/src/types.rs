//! Core types: keywords, inbound events, match results, queue records, message logs,
//! destinations and the notification rows written by the fan-out.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// How a keyword is compared against message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    #[default]
    Contains,
    Regex,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Contains => "contains",
            MatchMode::Regex => "regex",
        }
    }
}

impl FromStr for MatchMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(MatchMode::Exact),
            "contains" => Ok(MatchMode::Contains),
            "regex" => Ok(MatchMode::Regex),
            other => Err(RelayError::Config(format!("unknown match mode: {}", other))),
        }
    }
}

/// A user-owned keyword. Identity is immutable; `priority` and `is_active` are user-editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub case_sensitive: bool,
    pub match_mode: MatchMode,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Media carried by an inbound message. Plain text messages are [`MediaKind::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Text,
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

impl FromStr for MediaKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MediaKind::Text),
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            other => Err(RelayError::Config(format!("unknown media kind: {}", other))),
        }
    }
}

/// Source chat of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundChat {
    pub id: String,
    pub chat_type: String,
}

/// Event as delivered by the chat transport. Text, caption and media are all optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat: InboundChat,
    pub message_id: String,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<MediaKind>,
    pub arrived_at: DateTime<Utc>,
    /// Transport payload, kept for the queue record's `raw_message_data`.
    pub raw: serde_json::Value,
}

impl InboundEvent {
    /// Text-only event for the given chat (used by adapters and tests).
    pub fn text(chat_id: impl Into<String>, message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat: InboundChat {
                id: chat_id.into(),
                chat_type: "channel".to_string(),
            },
            message_id: message_id.into(),
            text: Some(text.into()),
            caption: None,
            media: None,
            arrived_at: Utc::now(),
            raw: serde_json::Value::Null,
        }
    }

    /// Extracts the normalized message shape. Text wins over caption; blank strings count as absent.
    pub fn classify(&self) -> InboundMessage {
        let present = |s: &Option<String>| {
            s.as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
        };
        let kind = self.media.unwrap_or_default();

        if let Some(text) = present(&self.text) {
            return InboundMessage::Text(text);
        }
        if let Some(text) = present(&self.caption) {
            return InboundMessage::Caption { text, kind };
        }
        match self.media {
            Some(MediaKind::Text) | None => InboundMessage::Unsupported,
            Some(kind) => InboundMessage::Media(kind),
        }
    }
}

/// Normalized inbound message; only `Text` and `Caption` carry matchable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    Caption { text: String, kind: MediaKind },
    Media(MediaKind),
    Unsupported,
}

impl InboundMessage {
    pub fn text(&self) -> Option<&str> {
        match self {
            InboundMessage::Text(text) | InboundMessage::Caption { text, .. } => Some(text),
            InboundMessage::Media(_) | InboundMessage::Unsupported => None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            InboundMessage::Text(_) | InboundMessage::Unsupported => MediaKind::Text,
            InboundMessage::Caption { kind, .. } => *kind,
            InboundMessage::Media(kind) => *kind,
        }
    }
}

/// Converts a transport-specific message into an [`InboundEvent`].
pub trait ToInboundEvent: Send + Sync {
    fn to_inbound(&self) -> InboundEvent;
}

/// Output of the matcher; consumed immediately by the duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub keyword_id: String,
    /// Keyword text as configured (or the regex match).
    pub matched_text: String,
    pub channel_id: String,
    pub user_id: String,
}

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = RelayError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(RelayError::Unknown(format!(
                        "unknown {}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum!(
    /// Delivery queue status. Automatic transitions only go pending → delivered | failed.
    QueueStatus { Pending => "pending", Delivered => "delivered", Failed => "failed" }
);

status_enum!(
    /// Message log status; written once as pending, then updated to a terminal value.
    LogStatus { Pending => "pending", Success => "success", Failed => "failed" }
);

/// Fields needed to create a queue record; the store assigns id, status and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueRecord {
    pub user_id: String,
    pub channel_id: String,
    pub original_chat_id: String,
    pub message_text: String,
    pub message_type: MediaKind,
    pub matched_keywords: Vec<String>,
    pub raw_message_data: serde_json::Value,
}

/// Durable "needs delivery" unit. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub original_chat_id: String,
    pub message_text: String,
    pub message_type: MediaKind,
    pub matched_keywords: Vec<String>,
    pub raw_message_data: serde_json::Value,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// Status change requested on a queue record.
///
/// `Delivered` and `Failed` only apply to pending records; `Retry` only applies to failed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueTransition {
    Delivered,
    Failed(String),
    Retry,
}

impl QueueTransition {
    /// Status a record must currently have for the transition to apply.
    pub fn required_status(&self) -> QueueStatus {
        match self {
            QueueTransition::Delivered | QueueTransition::Failed(_) => QueueStatus::Pending,
            QueueTransition::Retry => QueueStatus::Failed,
        }
    }

    pub fn target_status(&self) -> QueueStatus {
        match self {
            QueueTransition::Delivered => QueueStatus::Delivered,
            QueueTransition::Failed(_) => QueueStatus::Failed,
            QueueTransition::Retry => QueueStatus::Pending,
        }
    }
}

/// Fields needed to create a message log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessageLog {
    pub user_id: String,
    pub keyword_id: String,
    pub channel_id: String,
    pub original_message_id: String,
    pub original_message_text: String,
    pub matched_text: String,
}

/// Audit row per forward attempt; also the duplicate-detection corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: String,
    pub user_id: String,
    pub keyword_id: String,
    pub channel_id: String,
    pub original_message_id: String,
    pub original_message_text: String,
    pub matched_text: String,
    pub status: LogStatus,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Configured delivery target. Read-only from the pipeline's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub chat_id: String,
    pub name: String,
    pub is_active: bool,
}

/// Notification-relevant part of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    /// Private chat with the bot, if the user linked one.
    pub telegram_chat_id: Option<i64>,
    pub email: Option<String>,
    pub email_notifications: bool,
}

impl UserProfile {
    /// Profile with no chat linkage and no email; used when the user row is missing.
    pub fn unlinked(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Row for the dashboard's polled feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub user_id: String,
    pub queue_id: String,
    pub channel_id: String,
    pub body: String,
}

/// Row for the email outbox; drained by a separate worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailOutboxEntry {
    pub user_id: String,
    pub queue_id: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
}

/// A user watching a source chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredChannel {
    pub user_id: String,
    pub chat_id: String,
}

/// Explicit user feedback on duplicate suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSignal {
    TooManyDuplicates,
    MissedDuplicates,
}

impl FromStr for FeedbackSignal {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "too_many_duplicates" => Ok(FeedbackSignal::TooManyDuplicates),
            "missed_duplicates" => Ok(FeedbackSignal::MissedDuplicates),
            other => Err(RelayError::Config(format!("unknown feedback signal: {}", other))),
        }
    }
}
