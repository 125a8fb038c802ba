//! # In-memory store
//!
//! Implements every relay store trait over plain collections, for tests and dry runs.
//! Data is lost on drop. The state sits behind a `tokio::sync::RwLock`, so clones share it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{
    Destination, DestinationStore, EmailOutbox, EmailOutboxEntry, FeedEntry, FeedStore, Keyword,
    KeywordStore, LogStatus, LogStore, MessageLog, MonitoredChannel, NewMessageLog,
    NewQueueRecord, QueueRecord, QueueStatus, QueueStore, QueueTransition, SettingsStore,
    StoreError, StoreResult, SubscriptionStore, UserProfile, UserStore,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, UserProfile>,
    keywords: Vec<Keyword>,
    destinations: Vec<Destination>,
    subscriptions: Vec<MonitoredChannel>,
    logs: Vec<MessageLog>,
    queue: Vec<QueueRecord>,
    feed: Vec<FeedEntry>,
    emails: Vec<EmailOutboxEntry>,
    thresholds: HashMap<String, f64>,
}

/// In-memory implementation of all store traits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save_user(&self, user: UserProfile) {
        self.state.write().await.users.insert(user.id.clone(), user);
    }

    pub async fn save_keyword(&self, keyword: Keyword) {
        let mut state = self.state.write().await;
        state.keywords.retain(|k| k.id != keyword.id);
        state.keywords.push(keyword);
    }

    pub async fn save_destination(&self, destination: Destination) {
        let mut state = self.state.write().await;
        state.destinations.retain(|d| d.id != destination.id);
        state.destinations.push(destination);
    }

    pub async fn add_subscription(&self, subscription: MonitoredChannel) {
        let mut state = self.state.write().await;
        if !state.subscriptions.contains(&subscription) {
            state.subscriptions.push(subscription);
        }
    }

    /// Inserts a log row as-is (e.g. with a backdated `created_at`).
    pub async fn push_log(&self, log: MessageLog) {
        self.state.write().await.logs.push(log);
    }

    pub async fn logs(&self) -> Vec<MessageLog> {
        self.state.read().await.logs.clone()
    }

    pub async fn queue_records(&self) -> Vec<QueueRecord> {
        self.state.read().await.queue.clone()
    }

    pub async fn feed_entries(&self) -> Vec<FeedEntry> {
        self.state.read().await.feed.clone()
    }

    pub async fn emails(&self) -> Vec<EmailOutboxEntry> {
        self.state.read().await.emails.clone()
    }
}

#[async_trait]
impl KeywordStore for InMemoryStore {
    async fn active_keywords(&self, user_id: &str) -> StoreResult<Vec<Keyword>> {
        let state = self.state.read().await;
        Ok(state
            .keywords
            .iter()
            .filter(|k| k.user_id == user_id && k.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LogStore for InMemoryStore {
    async fn insert_log(&self, entry: NewMessageLog) -> StoreResult<MessageLog> {
        let log = MessageLog {
            id: Uuid::new_v4().to_string(),
            user_id: entry.user_id,
            keyword_id: entry.keyword_id,
            channel_id: entry.channel_id,
            original_message_id: entry.original_message_id,
            original_message_text: entry.original_message_text,
            matched_text: entry.matched_text,
            status: LogStatus::Pending,
            processing_time_ms: None,
            created_at: Utc::now(),
        };
        self.state.write().await.logs.push(log.clone());
        Ok(log)
    }

    async fn update_log_status(
        &self,
        id: &str,
        status: LogStatus,
        processing_time_ms: Option<i64>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let log = state
            .logs
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("message log {}", id)))?;
        log.status = status;
        if processing_time_ms.is_some() {
            log.processing_time_ms = processing_time_ms;
        }
        Ok(())
    }

    async fn recent_log_texts(
        &self,
        user_id: &str,
        keyword_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let mut window: Vec<&MessageLog> = state
            .logs
            .iter()
            .filter(|l| l.user_id == user_id && l.keyword_id == keyword_id && l.created_at >= since)
            .collect();
        window.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(window
            .into_iter()
            .take(limit)
            .map(|l| l.original_message_text.clone())
            .collect())
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn insert_record(&self, record: NewQueueRecord) -> StoreResult<QueueRecord> {
        let queued = QueueRecord {
            id: Uuid::new_v4().to_string(),
            user_id: record.user_id,
            channel_id: record.channel_id,
            original_chat_id: record.original_chat_id,
            message_text: record.message_text,
            message_type: record.message_type,
            matched_keywords: record.matched_keywords,
            raw_message_data: record.raw_message_data,
            status: QueueStatus::Pending,
            created_at: Utc::now(),
            delivered_at: None,
            failure_reason: None,
        };
        self.state.write().await.queue.push(queued.clone());
        Ok(queued)
    }

    async fn get_record(&self, id: &str) -> StoreResult<Option<QueueRecord>> {
        let state = self.state.read().await;
        Ok(state.queue.iter().find(|r| r.id == id).cloned())
    }

    async fn apply_transition(
        &self,
        id: &str,
        transition: QueueTransition,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let record = state
            .queue
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("queue record {}", id)))?;

        if record.status != transition.required_status() {
            return Ok(false);
        }
        record.status = transition.target_status();
        match transition {
            QueueTransition::Delivered => record.delivered_at = Some(at),
            QueueTransition::Failed(reason) => record.failure_reason = Some(reason),
            QueueTransition::Retry => {
                record.failure_reason = None;
                record.delivered_at = None;
            }
        }
        Ok(true)
    }

    async fn failed_records(&self, limit: usize) -> StoreResult<Vec<QueueRecord>> {
        let state = self.state.read().await;
        Ok(state
            .queue
            .iter()
            .rev()
            .filter(|r| r.status == QueueStatus::Failed)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DestinationStore for InMemoryStore {
    async fn active_destinations(&self, user_id: &str) -> StoreResult<Vec<Destination>> {
        let state = self.state.read().await;
        Ok(state
            .destinations
            .iter()
            .filter(|d| d.user_id == user_id && d.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn dedup_threshold(&self, user_id: &str) -> StoreResult<Option<f64>> {
        Ok(self.state.read().await.thresholds.get(user_id).copied())
    }

    async fn set_dedup_threshold(&self, user_id: &str, threshold: f64) -> StoreResult<()> {
        self.state
            .write()
            .await
            .thresholds
            .insert(user_id.to_string(), threshold);
        Ok(())
    }
}

#[async_trait]
impl FeedStore for InMemoryStore {
    async fn insert_feed(&self, entry: FeedEntry) -> StoreResult<()> {
        self.state.write().await.feed.push(entry);
        Ok(())
    }
}

#[async_trait]
impl EmailOutbox for InMemoryStore {
    async fn queue_email(&self, entry: EmailOutboxEntry) -> StoreResult<()> {
        self.state.write().await.emails.push(entry);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn active_subscriptions(&self) -> StoreResult<Vec<MonitoredChannel>> {
        Ok(self.state.read().await.subscriptions.clone())
    }
}
