//! Sinks written by the fan-out: dashboard feed rows and queued emails.

use async_trait::async_trait;
use chrono::Utc;
use relay_core::{EmailOutbox, EmailOutboxEntry, FeedEntry, FeedStore, StoreResult};
use tracing::debug;
use uuid::Uuid;

use crate::error::db_err;
use crate::sqlite_store::SqliteStore;

impl SqliteStore {
    /// Feed rows of a user, newest first.
    pub async fn feed_entries(&self, user_id: &str) -> StoreResult<Vec<FeedEntry>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT user_id, queue_id, channel_id, body FROM feed_notifications WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(user_id, queue_id, channel_id, body)| FeedEntry {
                user_id,
                queue_id,
                channel_id,
                body,
            })
            .collect())
    }

    /// Emails still waiting for the outbox worker.
    pub async fn queued_emails(&self, user_id: &str) -> StoreResult<Vec<EmailOutboxEntry>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT user_id, queue_id, to_address, subject, body FROM email_outbox WHERE user_id = ? AND status = 'queued' ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(user_id, queue_id, to_address, subject, body)| EmailOutboxEntry {
                user_id,
                queue_id,
                to_address,
                subject,
                body,
            })
            .collect())
    }
}

#[async_trait]
impl FeedStore for SqliteStore {
    async fn insert_feed(&self, entry: FeedEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_notifications (id, user_id, queue_id, channel_id, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.user_id)
        .bind(&entry.queue_id)
        .bind(&entry.channel_id)
        .bind(&entry.body)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        debug!(user_id = %entry.user_id, queue_id = %entry.queue_id, "Inserted feed notification");
        Ok(())
    }
}

#[async_trait]
impl EmailOutbox for SqliteStore {
    async fn queue_email(&self, entry: EmailOutboxEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_outbox (id, user_id, queue_id, to_address, subject, body, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'queued', ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.user_id)
        .bind(&entry.queue_id)
        .bind(&entry.to_address)
        .bind(&entry.subject)
        .bind(&entry.body)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        debug!(user_id = %entry.user_id, queue_id = %entry.queue_id, "Queued digest email");
        Ok(())
    }
}
