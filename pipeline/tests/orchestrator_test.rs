//! Orchestrator integration tests over the in-memory store.

mod common;

use std::sync::Arc;

use common::*;
use pipeline::{DropReason, MatchPolicy, PipelineConfig, PipelineOutcome, Stage, Stores};
use relay_core::{
    FeedbackSignal, LogStatus, MediaKind, QueueStatus, RelayError, SettingsStore, UserProfile,
};
use storage::InMemoryStore;

fn delivered_keyword(outcome: &PipelineOutcome) -> Option<&str> {
    match outcome {
        PipelineOutcome::Delivered { keyword_id, .. } => Some(keyword_id.as_str()),
        _ => None,
    }
}

/// **Test: Matching message is logged, queued, forwarded and marked delivered.**
///
/// **Setup:** User u1 monitors chat 100 with keyword "economy" (contains, case-insensitive) and one destination.
///
/// **Action:** Handle "breaking news about economy" from chat 100.
///
/// **Expected:** One success log, one delivered queue record, one destination send, one feed row.
#[tokio::test]
async fn test_end_to_end_delivery() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].user_id, "u1");
    assert_eq!(delivered_keyword(&outcomes[0].outcome), Some("k1"));

    let logs = h.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Success);
    assert_eq!(logs[0].matched_text, "economy");
    assert!(logs[0].processing_time_ms.is_some());

    let records = h.store.queue_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, QueueStatus::Delivered);
    assert!(records[0].delivered_at.is_some());
    assert_eq!(records[0].matched_keywords, vec!["economy".to_string()]);

    assert_eq!(h.channel.send_count(), 1);
    let texts = h.channel.texts.lock().unwrap().clone();
    assert_eq!(
        texts,
        vec![(
            "d1".to_string(),
            "[100]\nKeywords: economy\n\nbreaking news about economy".to_string()
        )]
    );
    assert_eq!(h.store.feed_entries().await.len(), 1);
    // no user row: no linked chat, no email
    assert_eq!(h.chat.call_count(), 0);
    assert!(h.store.emails().await.is_empty());
}

/// **Test: Event without text or caption has zero side effects.**
#[tokio::test]
async fn test_media_only_event_is_dropped_silently() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;

    let outcomes = h.orchestrator.handle_event(&media_only_event("100", "1")).await;
    let mut blank = text_event("100", "2", "   ");
    blank.caption = Some("\n".to_string());
    let blank_outcomes = h.orchestrator.handle_event(&blank).await;

    assert_eq!(outcomes[0].outcome, PipelineOutcome::Dropped(DropReason::NoText));
    assert_eq!(blank_outcomes[0].outcome, PipelineOutcome::Dropped(DropReason::NoText));
    assert!(h.store.logs().await.is_empty());
    assert!(h.store.queue_records().await.is_empty());
    assert!(h.store.feed_entries().await.is_empty());
    assert_eq!(h.channel.send_count(), 0);
    assert_eq!(h.chat.call_count(), 0);
}

#[tokio::test]
async fn test_caption_is_matched_and_media_kind_kept() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;

    let mut event = media_only_event("100", "7");
    event.caption = Some("Chart of the economy".to_string());
    let outcomes = h.orchestrator.handle_event(&event).await;

    assert_eq!(delivered_keyword(&outcomes[0].outcome), Some("k1"));
    let records = h.store.queue_records().await;
    assert_eq!(records[0].message_type, MediaKind::Photo);
    assert_eq!(records[0].message_text, "Chart of the economy");
}

#[tokio::test]
async fn test_unmatched_message_is_dropped() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "weather is sunny"))
        .await;

    assert_eq!(outcomes[0].outcome, PipelineOutcome::Dropped(DropReason::Unmatched));
    assert!(h.store.logs().await.is_empty());
    assert!(h.store.queue_records().await.is_empty());
}

/// **Test: First match wins by priority.**
///
/// **Setup:** Keywords "a" (priority 5) and "b" (priority 10).
///
/// **Action:** Handle a message containing both.
///
/// **Expected:** Exactly one forward, attributed to "b".
#[tokio::test]
async fn test_first_match_wins() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("ka", "u1", "a", 5)).await;
    h.store.save_keyword(keyword("kb", "u1", "b", 10)).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "a then b"))
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(delivered_keyword(&outcomes[0].outcome), Some("kb"));
    let logs = h.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].keyword_id, "kb");
    assert_eq!(h.store.queue_records().await.len(), 1);
}

#[tokio::test]
async fn test_all_matches_policy_forwards_each_keyword() {
    let config = PipelineConfig {
        match_policy: MatchPolicy::AllMatches,
        ..PipelineConfig::default()
    };
    let h = Harness::new(config);
    h.store.save_keyword(keyword("ka", "u1", "a", 5)).await;
    h.store.save_keyword(keyword("kb", "u1", "b", 10)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "a then b"))
        .await;

    let keywords: Vec<_> = outcomes
        .iter()
        .filter_map(|o| delivered_keyword(&o.outcome))
        .collect();
    assert_eq!(keywords, vec!["kb", "ka"]);
    assert_eq!(h.store.logs().await.len(), 2);
    assert_eq!(h.store.queue_records().await.len(), 2);
    assert_eq!(h.channel.send_count(), 2);
}

/// **Test: Same text twice within the window is forwarded once.**
///
/// **Expected:** Second event dropped as duplicate before enqueue; one success log.
#[tokio::test]
async fn test_duplicate_suppression() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;

    let first = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;
    let second = h
        .orchestrator
        .handle_event(&text_event("100", "2", "Breaking news about the economy!"))
        .await;

    assert!(delivered_keyword(&first[0].outcome).is_some());
    assert_eq!(second[0].outcome, PipelineOutcome::Dropped(DropReason::Duplicate));

    let logs = h.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Success);
    assert_eq!(h.store.queue_records().await.len(), 1);
    assert_eq!(h.channel.send_count(), 1);
}

#[tokio::test]
async fn test_persian_spelling_variant_is_duplicate() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "دلار", 0)).await;

    let first = h
        .orchestrator
        .handle_event(&text_event("100", "1", "افزایش قیمت دلار در بازار تهران"))
        .await;
    // Arabic Yeh spelling
    let second = h
        .orchestrator
        .handle_event(&text_event("100", "2", "افزايش قيمت دلار در بازار تهران"))
        .await;

    assert!(delivered_keyword(&first[0].outcome).is_some());
    assert_eq!(second[0].outcome, PipelineOutcome::Dropped(DropReason::Duplicate));
}

#[tokio::test]
async fn test_concurrent_near_duplicates_forward_once() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;

    let first_event = text_event("100", "1", "breaking news about economy");
    let second_event = text_event("100", "2", "breaking news about economy");
    let (first, second) = tokio::join!(
        h.orchestrator.handle_event(&first_event),
        h.orchestrator.handle_event(&second_event),
    );

    let delivered = [&first[0].outcome, &second[0].outcome]
        .iter()
        .filter(|o| delivered_keyword(o).is_some())
        .count();
    assert_eq!(delivered, 1);
    assert_eq!(h.store.logs().await.len(), 1);
}

/// **Test: A failed history read is a hard failure, never "not a duplicate".**
#[tokio::test]
async fn test_dedup_storage_error_stops_before_enqueue() {
    let store = InMemoryStore::new();
    let mut stores = Stores::from_shared(Arc::new(store.clone()));
    stores.logs = Arc::new(UnreadableLogs {
        inner: store.clone(),
    });
    let h = Harness::with_stores(store, stores, PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;

    match &outcomes[0].outcome {
        PipelineOutcome::Failed { stage, reason } => {
            assert_eq!(*stage, Stage::Dedup);
            assert!(reason.contains("database is locked"));
        }
        other => panic!("expected dedup failure, got {:?}", other),
    }
    assert!(h.store.logs().await.is_empty());
    assert!(h.store.queue_records().await.is_empty());
    assert_eq!(h.channel.send_count(), 0);
}

/// **Test: Every destination failing marks queue and log failed; the log is kept.**
#[tokio::test]
async fn test_all_destinations_failing_marks_failed() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.store.save_destination(destination("d2", "u1", "-1002")).await;
    h.channel.set_failing(true);

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;

    assert!(matches!(
        outcomes[0].outcome,
        PipelineOutcome::Failed {
            stage: Stage::Notify,
            ..
        }
    ));
    let records = h.store.queue_records().await;
    assert_eq!(records[0].status, QueueStatus::Failed);
    let reason = records[0].failure_reason.clone().unwrap_or_default();
    assert!(reason.contains("all destinations failed"));
    assert!(reason.contains("d1") && reason.contains("d2"));

    let logs = h.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    // fan-out channels still ran
    assert_eq!(h.store.feed_entries().await.len(), 1);
    assert_eq!(h.channel.send_count(), 2);
}

#[tokio::test]
async fn test_partial_destination_failure_is_delivered() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.store.save_destination(destination("d2", "u1", "-1002")).await;
    h.channel.reject_chat("-1002");

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "economy update"))
        .await;

    assert!(delivered_keyword(&outcomes[0].outcome).is_some());
    assert_eq!(h.channel.send_count(), 2);
    assert_eq!(h.store.queue_records().await[0].status, QueueStatus::Delivered);
    assert_eq!(h.store.logs().await[0].status, LogStatus::Success);
}

#[tokio::test]
async fn test_retry_redelivers_failed_record() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.channel.set_failing(true);
    h.orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;
    let queue_id = h.store.queue_records().await[0].id.clone();
    assert_eq!(h.orchestrator.failed_records(10).await.unwrap().len(), 1);

    h.channel.set_failing(false);
    let status = h.orchestrator.retry_delivery(&queue_id).await.unwrap();

    assert_eq!(status, QueueStatus::Delivered);
    let record = h.store.queue_records().await[0].clone();
    assert_eq!(record.status, QueueStatus::Delivered);
    assert!(record.failure_reason.is_none());
    assert_eq!(h.channel.send_count(), 2);

    let err = h.orchestrator.retry_delivery(&queue_id).await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidState(_)));
    assert_eq!(h.channel.send_count(), 2);
}

#[tokio::test]
async fn test_retry_that_fails_again_stays_failed() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.channel.set_failing(true);
    h.orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;
    let queue_id = h.store.queue_records().await[0].id.clone();

    let status = h.orchestrator.retry_delivery(&queue_id).await.unwrap();

    assert_eq!(status, QueueStatus::Failed);
    assert_eq!(h.store.queue_records().await[0].status, QueueStatus::Failed);
}

#[tokio::test]
async fn test_unmonitored_chat_has_no_side_effects() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("999", "1", "economy"))
        .await;

    assert!(outcomes.is_empty());
    assert!(h.store.logs().await.is_empty());
}

#[tokio::test]
async fn test_no_destinations_notifications_count_as_delivery() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store
        .save_user(UserProfile {
            email: Some("u1@example.com".to_string()),
            email_notifications: true,
            ..linked_user("u1", 555)
        })
        .await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "economy"))
        .await;

    assert!(delivered_keyword(&outcomes[0].outcome).is_some());
    assert_eq!(h.channel.send_count(), 0);
    assert_eq!(h.chat.call_count(), 1);
    let emails = h.store.emails().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to_address, "u1@example.com");
    assert_eq!(emails[0].subject, "New match from 100: economy");
}

#[tokio::test]
async fn test_each_subscriber_processed_in_order() {
    let h = Harness::new(PipelineConfig::default());
    h.registry.add("100", "u2");
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_keyword(keyword("k2", "u2", "news", 0)).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "economy news"))
        .await;

    let users: Vec<&str> = outcomes.iter().map(|o| o.user_id.as_str()).collect();
    assert_eq!(users, vec!["u1", "u2"]);
    assert_eq!(delivered_keyword(&outcomes[1].outcome), Some("k2"));
}

/// **Test: A panic in one user's run does not stop the others.**
#[tokio::test]
async fn test_panic_is_contained_per_user() {
    let store = InMemoryStore::new();
    let mut stores = Stores::from_shared(Arc::new(store.clone()));
    stores.keywords = Arc::new(PanickingKeywords {
        inner: store.clone(),
        panic_for: "boom".to_string(),
    });
    let h = Harness::with_stores(store, stores, PipelineConfig::default());
    h.registry.remove("100", "u1");
    h.registry.add("100", "boom");
    h.registry.add("100", "u1");
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "economy"))
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].user_id, "boom");
    assert!(matches!(
        &outcomes[0].outcome,
        PipelineOutcome::Failed { stage: Stage::Pipeline, reason } if reason.contains("corrupt keyword row")
    ));
    assert!(delivered_keyword(&outcomes[1].outcome).is_some());
}

#[tokio::test]
async fn test_feedback_adjusts_and_persists_threshold() {
    let h = Harness::new(PipelineConfig::default());

    let raised = h
        .orchestrator
        .feedback("u1", FeedbackSignal::TooManyDuplicates)
        .await
        .unwrap();
    assert_eq!(raised, 0.85);
    assert_eq!(h.store.dedup_threshold("u1").await.unwrap(), Some(0.85));

    let lowered = h
        .orchestrator
        .feedback("u1", FeedbackSignal::MissedDuplicates)
        .await
        .unwrap();
    assert!(lowered < raised);
}

/// **Test: A panic during delivery settles the log and queue record as failed.**
///
/// **Setup:** Keyword "economy", one destination, a delivery channel that panics on send.
///
/// **Action:** Handle a matching event, then retry once the channel recovers.
///
/// **Expected:** Failed outcome carrying the panic message; log and record both `failed`;
/// the record is listed for triage and a retry delivers it.
#[tokio::test]
async fn test_panic_during_delivery_marks_log_and_record_failed() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.channel.set_panicking(true);

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;

    assert!(matches!(
        &outcomes[0].outcome,
        PipelineOutcome::Failed { stage: Stage::Pipeline, reason } if reason == "driver bug"
    ));
    let logs = h.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    let records = h.store.queue_records().await;
    assert_eq!(records[0].status, QueueStatus::Failed);
    assert_eq!(records[0].failure_reason.as_deref(), Some("driver bug"));

    let failed = h.orchestrator.failed_records(10).await.unwrap();
    assert_eq!(failed.len(), 1);

    h.channel.set_panicking(false);
    let status = h.orchestrator.retry_delivery(&failed[0].id).await.unwrap();
    assert_eq!(status, QueueStatus::Delivered);
}

/// **Test: A panic during a retry leaves the record failed and retriable.**
#[tokio::test]
async fn test_panic_during_retry_keeps_record_failed() {
    let h = Harness::new(PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.channel.set_failing(true);
    h.orchestrator
        .handle_event(&text_event("100", "1", "economy"))
        .await;
    let queue_id = h.store.queue_records().await[0].id.clone();

    h.channel.set_failing(false);
    h.channel.set_panicking(true);
    let status = h.orchestrator.retry_delivery(&queue_id).await.unwrap();

    assert_eq!(status, QueueStatus::Failed);
    let record = h.store.queue_records().await[0].clone();
    assert_eq!(record.status, QueueStatus::Failed);
    assert_eq!(record.failure_reason.as_deref(), Some("driver bug"));
}

/// **Test: A failed log insert stops the run before anything is queued or sent.**
///
/// **Setup:** Log store rejecting inserts; keyword "economy" and one destination.
///
/// **Action:** Handle a matching event.
///
/// **Expected:** Failed at the log stage; no log row, no queue record, no sends, no feed row.
#[tokio::test]
async fn test_log_insert_failure_stops_before_enqueue() {
    let store = InMemoryStore::new();
    let mut stores = Stores::from_shared(Arc::new(store.clone()));
    stores.logs = Arc::new(ReadOnlyLogs {
        inner: store.clone(),
    });
    let h = Harness::with_stores(store, stores, PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;

    assert!(matches!(
        &outcomes[0].outcome,
        PipelineOutcome::Failed { stage: Stage::Log, reason } if reason.contains("readonly")
    ));
    assert!(h.store.logs().await.is_empty());
    assert!(h.store.queue_records().await.is_empty());
    assert_eq!(h.channel.send_count(), 0);
    assert!(h.store.feed_entries().await.is_empty());
}

/// **Test: A failed enqueue marks the kept log row failed and notifies nobody.**
///
/// **Setup:** Queue store rejecting inserts; linked user with email enabled, one destination.
///
/// **Action:** Handle a matching event.
///
/// **Expected:** Failed at the enqueue stage; one `failed` log row; zero destination sends,
/// direct-chat calls, feed rows and emails.
#[tokio::test]
async fn test_enqueue_failure_marks_log_failed_without_fan_out() {
    let store = InMemoryStore::new();
    let mut stores = Stores::from_shared(Arc::new(store.clone()));
    stores.queue = Arc::new(FullQueue {
        inner: store.clone(),
    });
    let h = Harness::with_stores(store, stores, PipelineConfig::default());
    h.store.save_keyword(keyword("k1", "u1", "economy", 0)).await;
    h.store.save_destination(destination("d1", "u1", "-1001")).await;
    h.store
        .save_user(UserProfile {
            email: Some("u1@example.com".to_string()),
            email_notifications: true,
            ..linked_user("u1", 555)
        })
        .await;

    let outcomes = h
        .orchestrator
        .handle_event(&text_event("100", "1", "breaking news about economy"))
        .await;

    assert!(matches!(
        &outcomes[0].outcome,
        PipelineOutcome::Failed { stage: Stage::Enqueue, reason } if reason.contains("disk is full")
    ));
    let logs = h.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    assert!(h.store.queue_records().await.is_empty());
    assert_eq!(h.channel.send_count(), 0);
    assert_eq!(h.chat.call_count(), 0);
    assert!(h.store.feed_entries().await.is_empty());
    assert!(h.store.emails().await.is_empty());
}
