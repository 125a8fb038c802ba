//! End-to-end pipeline over SQLite (`sqlite::memory:`), registry seeded from the
//! monitored_channels table.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{destination, keyword, text_event, RecordingChannel, RecordingChat};
use pipeline::{ChannelRegistry, DropReason, Orchestrator, PipelineConfig, PipelineOutcome, Stores};
use relay_core::{LogStatus, MonitoredChannel, QueueStatus, SubscriptionStore};
use storage::SqliteStore;

async fn setup() -> (SqliteStore, Arc<RecordingChannel>, Orchestrator) {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    store
        .add_subscription(&MonitoredChannel {
            user_id: "u1".to_string(),
            chat_id: "100".to_string(),
        })
        .await
        .unwrap();
    store
        .save_keyword(&keyword("k1", "u1", "economy", 0))
        .await
        .unwrap();
    let mut newer = keyword("k2", "u1", "news", 0);
    newer.created_at = Utc::now() + Duration::seconds(1);
    store.save_keyword(&newer).await.unwrap();
    store
        .save_destination(&destination("d1", "u1", "-1001"))
        .await
        .unwrap();

    let subscriptions = store.active_subscriptions().await.unwrap();
    let registry = Arc::new(ChannelRegistry::from_subscriptions(&subscriptions));
    let channel = Arc::new(RecordingChannel::default());
    let orchestrator = Orchestrator::new(
        Stores::from_shared(Arc::new(store.clone())),
        registry,
        channel.clone(),
        Arc::new(RecordingChat::default()),
        PipelineConfig::default(),
    );
    (store, channel, orchestrator)
}

/// **Test: Inbound message flows through SQLite to a delivered record.**
///
/// **Setup:** u1 monitors chat 100 (stored subscription), keywords "economy" and newer "news" at equal priority.
///
/// **Action:** Handle "breaking news about economy" twice.
///
/// **Expected:** Newer keyword wins the tie; one success log, one delivered record, second event dropped.
#[tokio::test]
async fn test_sqlite_end_to_end() {
    let (store, channel, orchestrator) = setup().await;

    let first = orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;
    let second = orchestrator
        .handle_event(&text_event("100", "2", "breaking news about economy"))
        .await;

    assert!(matches!(
        &first[0].outcome,
        PipelineOutcome::Delivered { keyword_id, .. } if keyword_id == "k2"
    ));
    assert_eq!(second[0].outcome, PipelineOutcome::Dropped(DropReason::Duplicate));

    let logs = store.list_logs("u1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Success);

    let records = store.list_queue_records("u1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, QueueStatus::Delivered);
    assert_eq!(channel.send_count(), 1);
    assert_eq!(store.feed_entries("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_failed_then_retried() {
    let (store, channel, orchestrator) = setup().await;
    channel.set_failing(true);

    orchestrator
        .handle_event(&text_event("100", "1", "economy update"))
        .await;
    let failed = orchestrator.failed_records(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(store.list_logs("u1").await.unwrap()[0].status, LogStatus::Failed);

    channel.set_failing(false);
    let status = orchestrator.retry_delivery(&failed[0].id).await.unwrap();

    assert_eq!(status, QueueStatus::Delivered);
    assert!(orchestrator.failed_records(10).await.unwrap().is_empty());
}
