//! Integration tests for [`storage::SqliteStore`] against a file-backed database.
//!
//! Covers persistence across reopen, subscriptions, destinations, users and the notification sinks.

use relay_core::{
    Destination, DestinationStore, EmailOutbox, EmailOutboxEntry, FeedEntry, FeedStore,
    MonitoredChannel, SubscriptionStore, UserProfile, UserStore,
};
use storage::SqliteStore;

fn destination(id: &str, active: bool) -> Destination {
    Destination {
        id: id.to_string(),
        user_id: "u1".to_string(),
        platform: "telegram".to_string(),
        chat_id: "-100200".to_string(),
        name: format!("dest {}", id),
        is_active: active,
    }
}

/// **Test: Data written through one store is visible after reopening the same file.**
///
/// **Setup:** Temp dir; save user, destination, subscription.
/// **Action:** Drop the store and open a new one on the same path.
/// **Expected:** User, active destination and subscription are all returned.
#[tokio::test]
async fn test_reopen_keeps_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.db");
    let url = path.to_str().unwrap().to_string();

    {
        let store = SqliteStore::new(&url).await.expect("Failed to create store");
        store
            .save_user(&UserProfile {
                id: "u1".to_string(),
                telegram_chat_id: Some(42),
                email: Some("u1@example.com".to_string()),
                email_notifications: true,
            })
            .await
            .unwrap();
        store.save_destination(&destination("d1", true)).await.unwrap();
        store.save_destination(&destination("d2", false)).await.unwrap();
        store
            .add_subscription(&MonitoredChannel {
                user_id: "u1".to_string(),
                chat_id: "100".to_string(),
            })
            .await
            .unwrap();
    }

    let store = SqliteStore::new(&url).await.expect("Failed to reopen store");
    let user = store.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.telegram_chat_id, Some(42));
    assert!(user.email_notifications);

    let destinations = store.active_destinations("u1").await.unwrap();
    assert_eq!(destinations.len(), 1);
    assert_eq!(destinations[0].id, "d1");

    let subscriptions = store.active_subscriptions().await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].chat_id, "100");
}

/// **Test: Removing a subscription deactivates it; adding again re-activates it.**
#[tokio::test]
async fn test_subscription_toggle() {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    let sub = MonitoredChannel {
        user_id: "u1".to_string(),
        chat_id: "100".to_string(),
    };
    store.add_subscription(&sub).await.unwrap();
    store.add_subscription(&sub).await.unwrap();
    assert_eq!(store.active_subscriptions().await.unwrap().len(), 1);

    assert!(store.remove_subscription("u1", "100").await.unwrap());
    assert!(!store.remove_subscription("u1", "100").await.unwrap());
    assert!(store.active_subscriptions().await.unwrap().is_empty());

    store.add_subscription(&sub).await.unwrap();
    assert_eq!(store.active_subscriptions().await.unwrap().len(), 1);
}

/// **Test: Feed rows and queued emails are readable per user.**
#[tokio::test]
async fn test_notification_sinks() {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    store
        .insert_feed(FeedEntry {
            user_id: "u1".to_string(),
            queue_id: "q1".to_string(),
            channel_id: "100".to_string(),
            body: "body".to_string(),
        })
        .await
        .unwrap();
    store
        .queue_email(EmailOutboxEntry {
            user_id: "u1".to_string(),
            queue_id: "q1".to_string(),
            to_address: "u1@example.com".to_string(),
            subject: "subject".to_string(),
            body: "body".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(store.feed_entries("u1").await.unwrap().len(), 1);
    let emails = store.queued_emails("u1").await.unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to_address, "u1@example.com");
    assert!(store.feed_entries("u2").await.unwrap().is_empty());
}

/// **Test: Unknown user returns None.**
#[tokio::test]
async fn test_get_user_missing() {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    assert!(store.get_user("nobody").await.unwrap().is_none());
}
