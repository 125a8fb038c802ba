//! Store traits the pipeline calls through. Implementations live in the `storage` crate
//! (SQLite and in-memory); every call is an async I/O boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{
    Destination, EmailOutboxEntry, FeedEntry, Keyword, LogStatus, MessageLog, MonitoredChannel,
    NewMessageLog, NewQueueRecord, QueueRecord, QueueTransition, UserProfile,
};

/// Read access to user keywords.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Active keywords of the user; order is not significant (the matcher sorts).
    async fn active_keywords(&self, user_id: &str) -> StoreResult<Vec<Keyword>>;
}

/// Message logs: audit trail and duplicate-detection corpus.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_log(&self, entry: NewMessageLog) -> StoreResult<MessageLog>;
    async fn update_log_status(
        &self,
        id: &str,
        status: LogStatus,
        processing_time_ms: Option<i64>,
    ) -> StoreResult<()>;
    /// Texts of the user's logs for `keyword_id` created at or after `since`, newest first, at most `limit`.
    async fn recent_log_texts(
        &self,
        user_id: &str,
        keyword_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<String>>;
}

/// Durable delivery queue records.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Inserts a `pending` record.
    async fn insert_record(&self, record: NewQueueRecord) -> StoreResult<QueueRecord>;
    async fn get_record(&self, id: &str) -> StoreResult<Option<QueueRecord>>;
    /// Applies the transition if the record is in [`QueueTransition::required_status`].
    /// Returns whether a row changed; an unknown id is `NotFound`.
    async fn apply_transition(
        &self,
        id: &str,
        transition: QueueTransition,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn failed_records(&self, limit: usize) -> StoreResult<Vec<QueueRecord>>;
}

#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn active_destinations(&self, user_id: &str) -> StoreResult<Vec<Destination>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;
}

/// Per-user duplicate threshold.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn dedup_threshold(&self, user_id: &str) -> StoreResult<Option<f64>>;
    async fn set_dedup_threshold(&self, user_id: &str, threshold: f64) -> StoreResult<()>;
}

/// Dashboard feed sink.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn insert_feed(&self, entry: FeedEntry) -> StoreResult<()>;
}

/// Email outbox sink; rows are inserted with status `queued`.
#[async_trait]
pub trait EmailOutbox: Send + Sync {
    async fn queue_email(&self, entry: EmailOutboxEntry) -> StoreResult<()>;
}

/// Monitored chats, used to seed the channel registry.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn active_subscriptions(&self) -> StoreResult<Vec<MonitoredChannel>>;
}
