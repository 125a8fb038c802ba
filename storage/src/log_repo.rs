//! Message log persistence: audit trail and duplicate-detection corpus.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{LogStatus, LogStore, MessageLog, NewMessageLog, StoreError, StoreResult};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::db_err;
use crate::models::MessageLogRow;
use crate::sqlite_store::SqliteStore;

impl SqliteStore {
    /// All logs of a user, newest first.
    pub async fn list_logs(&self, user_id: &str) -> StoreResult<Vec<MessageLog>> {
        let rows: Vec<MessageLogRow> = sqlx::query_as(
            "SELECT * FROM message_logs WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        rows.into_iter().map(MessageLog::try_from).collect()
    }
}

#[async_trait]
impl LogStore for SqliteStore {
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

        sqlx::query(
            r#"
            INSERT INTO message_logs
                (id, user_id, keyword_id, channel_id, original_message_id,
                 original_message_text, matched_text, status, processing_time_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.user_id)
        .bind(&log.keyword_id)
        .bind(&log.channel_id)
        .bind(&log.original_message_id)
        .bind(&log.original_message_text)
        .bind(&log.matched_text)
        .bind(log.status.as_str())
        .bind(log.processing_time_ms)
        .bind(log.created_at)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        info!(log_id = %log.id, user_id = %log.user_id, keyword_id = %log.keyword_id, "Saved message log");
        Ok(log)
    }

    async fn update_log_status(
        &self,
        id: &str,
        status: LogStatus,
        processing_time_ms: Option<i64>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE message_logs SET status = ?, processing_time_ms = COALESCE(?, processing_time_ms) WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(processing_time_ms)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("message log {}", id)));
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
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT original_message_text FROM message_logs
            WHERE user_id = ? AND keyword_id = ? AND created_at >= ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(keyword_id)
        .bind(since)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        debug!(user_id = %user_id, keyword_id = %keyword_id, count = rows.len(), "Loaded duplicate window");
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
