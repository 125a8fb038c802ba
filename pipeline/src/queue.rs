//! Delivery queue: creates pending records and owns their status transitions.
//!
//! `enqueue` and `retry` surface store errors. `mark_delivered`/`mark_failed` are best-effort:
//! a failed bookkeeping write is logged and reported as `false`, never raised.

use std::sync::Arc;

use chrono::Utc;
use relay_core::{
    NewQueueRecord, QueueRecord, QueueStatus, QueueStore, QueueTransition, RelayError, Result,
    StoreError,
};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct DeliveryQueue {
    store: Arc<dyn QueueStore>,
}

impl DeliveryQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Creates a `pending` record. Success does not imply delivery.
    pub async fn enqueue(&self, record: NewQueueRecord) -> Result<QueueRecord> {
        let queued = self.store.insert_record(record).await?;
        info!(
            queue_id = %queued.id,
            user_id = %queued.user_id,
            channel_id = %queued.channel_id,
            "step: queue record created"
        );
        Ok(queued)
    }

    /// Sets `delivered`; a no-op for records that already left `pending`.
    pub async fn mark_delivered(&self, id: &str) -> bool {
        self.transition(id, QueueTransition::Delivered).await
    }

    /// Sets `failed` with the reason; a no-op for records that already left `pending`.
    pub async fn mark_failed(&self, id: &str, reason: &str) -> bool {
        self.transition(id, QueueTransition::Failed(reason.to_string()))
            .await
    }

    async fn transition(&self, id: &str, transition: QueueTransition) -> bool {
        let target = transition.target_status();
        match self.store.apply_transition(id, transition, Utc::now()).await {
            Ok(true) => {
                info!(queue_id = %id, status = %target, "step: queue record updated");
                true
            }
            Ok(false) => {
                warn!(
                    queue_id = %id,
                    status = %target,
                    "Queue record not pending, transition skipped"
                );
                false
            }
            Err(e) => {
                error!(queue_id = %id, status = %target, error = %e, "Failed to update queue record");
                false
            }
        }
    }

    /// Resets a `failed` record to `pending` and returns it. Any other state is an error.
    pub async fn retry(&self, id: &str) -> Result<QueueRecord> {
        let record = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("queue record {}", id)))?;
        if record.status != QueueStatus::Failed {
            return Err(RelayError::InvalidState(format!(
                "queue record {} is {}, only failed records can be retried",
                id, record.status
            )));
        }
        if !self
            .store
            .apply_transition(id, QueueTransition::Retry, Utc::now())
            .await?
        {
            return Err(RelayError::InvalidState(format!(
                "queue record {} changed state during retry",
                id
            )));
        }
        info!(queue_id = %id, "step: queue record reset to pending");
        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> Result<QueueRecord> {
        self.store
            .get_record(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("queue record {}", id)).into())
    }

    pub async fn failed(&self, limit: usize) -> Result<Vec<QueueRecord>> {
        Ok(self.store.failed_records(limit).await?)
    }
}
