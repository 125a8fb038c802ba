//! Shared fixtures for pipeline integration tests: recording delivery fakes, failing stores,
//! and a harness wiring an [`Orchestrator`] to an [`InMemoryStore`].

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline::{ChannelRegistry, Orchestrator, PipelineConfig, Stores};
use relay_core::{
    ChatNotifier, DeliveryChannel, Destination, InboundEvent, Keyword, KeywordStore, LogStatus,
    LogStore, MatchMode, MediaKind, MessageLog, NewMessageLog, NewQueueRecord, QueueRecord,
    QueueStore, QueueTransition, RelayError, Result, StoreError, StoreResult, UserProfile,
};
use storage::InMemoryStore;

/// Records every send; fails all sends while `fail` is set and sends to rejected chats always.
/// Panics on send while `panic` is set.
#[derive(Default)]
pub struct RecordingChannel {
    pub sends: AtomicUsize,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    pub rejected: Mutex<Vec<String>>,
    pub texts: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_panicking(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    pub fn reject_chat(&self, chat_id: &str) {
        self.rejected.lock().unwrap().push(chat_id.to_string());
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, destination: &Destination, text: &str) -> Result<String> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic.load(Ordering::SeqCst) {
            panic!("driver bug");
        }
        let rejected = self.rejected.lock().unwrap().contains(&destination.chat_id);
        if rejected || self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::Delivery(format!("{} unreachable", destination.chat_id)));
        }
        self.texts
            .lock()
            .unwrap()
            .push((destination.id.clone(), text.to_string()));
        Ok(n.to_string())
    }
}

#[derive(Default)]
pub struct RecordingChat {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl RecordingChat {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatNotifier for RecordingChat {
    async fn notify_chat(&self, _chat_id: i64, _text: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::Delivery("bot blocked by user".to_string()));
        }
        Ok(())
    }
}

/// Log store whose history reads always fail.
pub struct UnreadableLogs {
    pub inner: InMemoryStore,
}

#[async_trait]
impl LogStore for UnreadableLogs {
    async fn insert_log(&self, entry: NewMessageLog) -> StoreResult<MessageLog> {
        self.inner.insert_log(entry).await
    }

    async fn update_log_status(
        &self,
        id: &str,
        status: LogStatus,
        processing_time_ms: Option<i64>,
    ) -> StoreResult<()> {
        self.inner.update_log_status(id, status, processing_time_ms).await
    }

    async fn recent_log_texts(
        &self,
        _user_id: &str,
        _keyword_id: &str,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> StoreResult<Vec<String>> {
        Err(StoreError::Database("database is locked".to_string()))
    }
}

/// Log store whose inserts always fail.
pub struct ReadOnlyLogs {
    pub inner: InMemoryStore,
}

#[async_trait]
impl LogStore for ReadOnlyLogs {
    async fn insert_log(&self, _entry: NewMessageLog) -> StoreResult<MessageLog> {
        Err(StoreError::Database("attempt to write a readonly database".to_string()))
    }

    async fn update_log_status(
        &self,
        id: &str,
        status: LogStatus,
        processing_time_ms: Option<i64>,
    ) -> StoreResult<()> {
        self.inner.update_log_status(id, status, processing_time_ms).await
    }

    async fn recent_log_texts(
        &self,
        user_id: &str,
        keyword_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<String>> {
        self.inner.recent_log_texts(user_id, keyword_id, since, limit).await
    }
}

/// Queue store that refuses new records and delegates everything else.
pub struct FullQueue {
    pub inner: InMemoryStore,
}

#[async_trait]
impl QueueStore for FullQueue {
    async fn insert_record(&self, _record: NewQueueRecord) -> StoreResult<QueueRecord> {
        Err(StoreError::Database("database or disk is full".to_string()))
    }

    async fn get_record(&self, id: &str) -> StoreResult<Option<QueueRecord>> {
        self.inner.get_record(id).await
    }

    async fn apply_transition(
        &self,
        id: &str,
        transition: QueueTransition,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.apply_transition(id, transition, at).await
    }

    async fn failed_records(&self, limit: usize) -> StoreResult<Vec<QueueRecord>> {
        self.inner.failed_records(limit).await
    }
}

/// Keyword store that panics for one user and delegates for everyone else.
pub struct PanickingKeywords {
    pub inner: InMemoryStore,
    pub panic_for: String,
}

#[async_trait]
impl KeywordStore for PanickingKeywords {
    async fn active_keywords(&self, user_id: &str) -> StoreResult<Vec<Keyword>> {
        if user_id == self.panic_for {
            panic!("corrupt keyword row for {}", user_id);
        }
        self.inner.active_keywords(user_id).await
    }
}

pub fn keyword(id: &str, user_id: &str, text: &str, priority: i32) -> Keyword {
    Keyword {
        id: id.to_string(),
        user_id: user_id.to_string(),
        text: text.to_string(),
        case_sensitive: false,
        match_mode: MatchMode::Contains,
        priority,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn destination(id: &str, user_id: &str, chat_id: &str) -> Destination {
    Destination {
        id: id.to_string(),
        user_id: user_id.to_string(),
        platform: relay_core::TELEGRAM_PLATFORM.to_string(),
        chat_id: chat_id.to_string(),
        name: format!("dest {}", id),
        is_active: true,
    }
}

pub fn linked_user(id: &str, chat_id: i64) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        telegram_chat_id: Some(chat_id),
        email: None,
        email_notifications: false,
    }
}

pub fn text_event(chat_id: &str, message_id: &str, text: &str) -> InboundEvent {
    InboundEvent::text(chat_id, message_id, text)
}

/// Event with neither text nor caption.
pub fn media_only_event(chat_id: &str, message_id: &str) -> InboundEvent {
    let mut event = InboundEvent::text(chat_id, message_id, "");
    event.text = None;
    event.media = Some(MediaKind::Photo);
    event
}

pub struct Harness {
    pub store: InMemoryStore,
    pub channel: Arc<RecordingChannel>,
    pub chat: Arc<RecordingChat>,
    pub registry: Arc<ChannelRegistry>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    /// Orchestrator over a fresh in-memory store with user `u1` monitoring chat `100`.
    pub fn new(config: PipelineConfig) -> Self {
        let store = InMemoryStore::new();
        Self::with_stores(store.clone(), Stores::from_shared(Arc::new(store)), config)
    }

    pub fn with_stores(store: InMemoryStore, stores: Stores, config: PipelineConfig) -> Self {
        let channel = Arc::new(RecordingChannel::default());
        let chat = Arc::new(RecordingChat::default());
        let registry = Arc::new(ChannelRegistry::new());
        registry.add("100", "u1");
        let orchestrator = Orchestrator::new(
            stores,
            registry.clone(),
            channel.clone(),
            chat.clone(),
            config,
        );
        Self {
            store,
            channel,
            chat,
            registry,
            orchestrator,
        }
    }
}
