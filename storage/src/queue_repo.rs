//! Delivery queue persistence (`forward_queue` table). Records are never deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{
    NewQueueRecord, QueueRecord, QueueStatus, QueueStore, QueueTransition, StoreError,
    StoreResult,
};
use tracing::info;
use uuid::Uuid;

use crate::error::{db_err, json_err};
use crate::models::QueueRow;
use crate::sqlite_store::SqliteStore;

impl SqliteStore {
    /// All queue records of a user, newest first.
    pub async fn list_queue_records(&self, user_id: &str) -> StoreResult<Vec<QueueRecord>> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            "SELECT * FROM forward_queue WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        rows.into_iter().map(QueueRecord::try_from).collect()
    }

    async fn record_exists(&self, id: &str) -> StoreResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM forward_queue WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn insert_record(&self, record: NewQueueRecord) -> StoreResult<QueueRecord> {
        let matched_keywords = serde_json::to_string(&record.matched_keywords).map_err(json_err)?;
        let raw_message_data = serde_json::to_string(&record.raw_message_data).map_err(json_err)?;
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

        sqlx::query(
            r#"
            INSERT INTO forward_queue
                (id, user_id, channel_id, original_chat_id, message_text, message_type,
                 matched_keywords, raw_message_data, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&queued.id)
        .bind(&queued.user_id)
        .bind(&queued.channel_id)
        .bind(&queued.original_chat_id)
        .bind(&queued.message_text)
        .bind(queued.message_type.as_str())
        .bind(matched_keywords)
        .bind(raw_message_data)
        .bind(queued.status.as_str())
        .bind(queued.created_at)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        info!(queue_id = %queued.id, user_id = %queued.user_id, "Enqueued forward");
        Ok(queued)
    }

    async fn get_record(&self, id: &str) -> StoreResult<Option<QueueRecord>> {
        let row: Option<QueueRow> = sqlx::query_as("SELECT * FROM forward_queue WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;
        row.map(QueueRecord::try_from).transpose()
    }

    async fn apply_transition(
        &self,
        id: &str,
        transition: QueueTransition,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let required = transition.required_status().as_str();
        let target = transition.target_status().as_str();

        let result = match &transition {
            QueueTransition::Delivered => {
                sqlx::query(
                    "UPDATE forward_queue SET status = ?, delivered_at = ? WHERE id = ? AND status = ?",
                )
                .bind(target)
                .bind(at)
                .bind(id)
                .bind(required)
                .execute(self.pool())
                .await
            }
            QueueTransition::Failed(reason) => {
                sqlx::query(
                    "UPDATE forward_queue SET status = ?, failure_reason = ? WHERE id = ? AND status = ?",
                )
                .bind(target)
                .bind(reason)
                .bind(id)
                .bind(required)
                .execute(self.pool())
                .await
            }
            QueueTransition::Retry => {
                sqlx::query(
                    "UPDATE forward_queue SET status = ?, failure_reason = NULL, delivered_at = NULL WHERE id = ? AND status = ?",
                )
                .bind(target)
                .bind(id)
                .bind(required)
                .execute(self.pool())
                .await
            }
        }
        .map_err(db_err)?;

        if result.rows_affected() > 0 {
            info!(queue_id = %id, status = %target, "Queue record transitioned");
            return Ok(true);
        }
        if !self.record_exists(id).await? {
            return Err(StoreError::NotFound(format!("queue record {}", id)));
        }
        Ok(false)
    }

    async fn failed_records(&self, limit: usize) -> StoreResult<Vec<QueueRecord>> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            "SELECT * FROM forward_queue WHERE status = 'failed' ORDER BY created_at DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        rows.into_iter().map(QueueRecord::try_from).collect()
    }
}
