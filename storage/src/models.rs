//! Row models mapping SQLite tables to relay-core types.
//!
//! Enum columns are stored as lowercase text; list/JSON columns as serialized JSON.

use chrono::{DateTime, Utc};
use relay_core::{
    Destination, Keyword, MessageLog, QueueRecord, StoreError, StoreResult, UserProfile,
};

use crate::error::json_err;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct KeywordRow {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub case_sensitive: bool,
    pub match_mode: String,
    pub priority: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<KeywordRow> for Keyword {
    type Error = StoreError;

    fn try_from(row: KeywordRow) -> StoreResult<Self> {
        Ok(Keyword {
            match_mode: parse_column("keywords.match_mode", &row.match_mode)?,
            priority: i32::try_from(row.priority).map_err(|_| {
                StoreError::Database(format!("keyword {} priority out of range", row.id))
            })?,
            id: row.id,
            user_id: row.user_id,
            text: row.text,
            case_sensitive: row.case_sensitive,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DestinationRow {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub chat_id: String,
    pub name: String,
    pub is_active: bool,
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Destination {
            id: row.id,
            user_id: row.user_id,
            platform: row.platform,
            chat_id: row.chat_id,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub telegram_chat_id: Option<i64>,
    pub email: Option<String>,
    pub email_notifications: bool,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            telegram_chat_id: row.telegram_chat_id,
            email: row.email,
            email_notifications: row.email_notifications,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageLogRow {
    pub id: String,
    pub user_id: String,
    pub keyword_id: String,
    pub channel_id: String,
    pub original_message_id: String,
    pub original_message_text: String,
    pub matched_text: String,
    pub status: String,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageLogRow> for MessageLog {
    type Error = StoreError;

    fn try_from(row: MessageLogRow) -> StoreResult<Self> {
        Ok(MessageLog {
            status: parse_column("message_logs.status", &row.status)?,
            id: row.id,
            user_id: row.user_id,
            keyword_id: row.keyword_id,
            channel_id: row.channel_id,
            original_message_id: row.original_message_id,
            original_message_text: row.original_message_text,
            matched_text: row.matched_text,
            processing_time_ms: row.processing_time_ms,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QueueRow {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub original_chat_id: String,
    pub message_text: String,
    pub message_type: String,
    pub matched_keywords: String,
    pub raw_message_data: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl TryFrom<QueueRow> for QueueRecord {
    type Error = StoreError;

    fn try_from(row: QueueRow) -> StoreResult<Self> {
        Ok(QueueRecord {
            message_type: parse_column("forward_queue.message_type", &row.message_type)?,
            status: parse_column("forward_queue.status", &row.status)?,
            matched_keywords: serde_json::from_str(&row.matched_keywords).map_err(json_err)?,
            raw_message_data: serde_json::from_str(&row.raw_message_data).map_err(json_err)?,
            id: row.id,
            user_id: row.user_id,
            channel_id: row.channel_id,
            original_chat_id: row.original_chat_id,
            message_text: row.message_text,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
            failure_reason: row.failure_reason,
        })
    }
}

fn parse_column<T>(column: &str, value: &str) -> StoreResult<T>
where
    T: std::str::FromStr,
{
    value
        .parse()
        .map_err(|_| StoreError::Database(format!("unexpected value in {}: {}", column, value)))
}
