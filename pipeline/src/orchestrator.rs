//! Per-event pipeline: match, dedup, log, enqueue, fan out, complete.
//!
//! [`Orchestrator::handle_event`] routes an inbound event to every subscriber of its chat and
//! runs the stages for each one in sequence. It never returns an error: stage failures become
//! [`PipelineOutcome::Failed`] (with the log row and queue record marked failed where they
//! exist). A panic after the log row is written is settled the same way; one earlier in a
//! user's run is caught per user so the transport loop keeps going.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use relay_core::{
    ChatNotifier, DeliveryChannel, DestinationStore, EmailOutbox, FeedStore, FeedbackSignal,
    InboundEvent, InboundMessage, KeywordStore, LogStatus, LogStore, MatchResult, NewMessageLog,
    NewQueueRecord, QueueRecord, QueueStatus, QueueStore, Result, SettingsStore, UserProfile,
    UserStore,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, instrument};

use crate::config::PipelineConfig;
use crate::dedup::DuplicateDetector;
use crate::locks::KeyedLocks;
use crate::matcher::KeywordMatcher;
use crate::notifier::Notifier;
use crate::queue::DeliveryQueue;
use crate::registry::ChannelRegistry;
use crate::stage::{best_effort, contained, guarded, panic_message, Stage, StageContext, StageFailure};

/// Store handles used by the pipeline.
#[derive(Clone)]
pub struct Stores {
    pub keywords: Arc<dyn KeywordStore>,
    pub logs: Arc<dyn LogStore>,
    pub queue: Arc<dyn QueueStore>,
    pub destinations: Arc<dyn DestinationStore>,
    pub users: Arc<dyn UserStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub feed: Arc<dyn FeedStore>,
    pub email: Arc<dyn EmailOutbox>,
}

impl Stores {
    /// All handles backed by one store implementing every trait.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: KeywordStore
            + LogStore
            + QueueStore
            + DestinationStore
            + UserStore
            + SettingsStore
            + FeedStore
            + EmailOutbox
            + 'static,
    {
        Self {
            keywords: store.clone(),
            logs: store.clone(),
            queue: store.clone(),
            destinations: store.clone(),
            users: store.clone(),
            settings: store.clone(),
            feed: store.clone(),
            email: store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoText,
    Unmatched,
    Duplicate,
}

/// Terminal state of one (event, user[, keyword]) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Dropped(DropReason),
    Delivered {
        queue_id: String,
        log_id: String,
        keyword_id: String,
    },
    Failed {
        stage: Stage,
        reason: String,
    },
}

impl From<StageFailure> for PipelineOutcome {
    fn from(failure: StageFailure) -> Self {
        PipelineOutcome::Failed {
            stage: failure.stage,
            reason: failure.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub user_id: String,
    pub outcome: PipelineOutcome,
}

pub struct Orchestrator {
    stores: Stores,
    registry: Arc<ChannelRegistry>,
    matcher: KeywordMatcher,
    detector: DuplicateDetector,
    queue: DeliveryQueue,
    notifier: Notifier,
    locks: KeyedLocks,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        registry: Arc<ChannelRegistry>,
        channel: Arc<dyn DeliveryChannel>,
        chat: Arc<dyn ChatNotifier>,
        config: PipelineConfig,
    ) -> Self {
        let detector = DuplicateDetector::new(stores.logs.clone(), stores.settings.clone(), &config);
        let queue = DeliveryQueue::new(stores.queue.clone());
        let notifier = Notifier::new(
            channel,
            chat,
            stores.feed.clone(),
            stores.email.clone(),
            config.feed_body_limit,
        );
        Self {
            matcher: KeywordMatcher::new(config.match_policy),
            stores,
            registry,
            detector,
            queue,
            notifier,
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Entry point for the chat transport. Subscribers are processed one after another in
    /// registration order; chats nobody monitors are ignored.
    #[instrument(skip(self, event), fields(channel_id = %event.chat.id, message_id = %event.message_id))]
    pub async fn handle_event(&self, event: &InboundEvent) -> Vec<EventOutcome> {
        let subscribers = self.registry.subscribers(&event.chat.id);
        if subscribers.is_empty() {
            debug!(channel_id = %event.chat.id, "Chat not monitored, event ignored");
            return Vec::new();
        }

        let message = event.classify();
        info!(
            channel_id = %event.chat.id,
            message_id = %event.message_id,
            kind = %message.kind().as_str(),
            subscribers = subscribers.len(),
            "step: event received"
        );

        if message.text().is_none() {
            info!(channel_id = %event.chat.id, "step: no text or caption, dropped");
            return subscribers
                .into_iter()
                .map(|user_id| EventOutcome {
                    user_id,
                    outcome: PipelineOutcome::Dropped(DropReason::NoText),
                })
                .collect();
        }

        let mut outcomes = Vec::new();
        for user_id in subscribers {
            let run = AssertUnwindSafe(self.process_for_user(&user_id, event, &message))
                .catch_unwind()
                .await;
            match run {
                Ok(results) => outcomes.extend(results.into_iter().map(|outcome| EventOutcome {
                    user_id: user_id.clone(),
                    outcome,
                })),
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(
                        user_id = %user_id,
                        channel_id = %event.chat.id,
                        message_id = %event.message_id,
                        reason = %reason,
                        "Pipeline panicked, event skipped for user"
                    );
                    outcomes.push(EventOutcome {
                        user_id,
                        outcome: PipelineOutcome::Failed {
                            stage: Stage::Pipeline,
                            reason,
                        },
                    });
                }
            }
        }
        outcomes
    }

    async fn process_for_user(
        &self,
        user_id: &str,
        event: &InboundEvent,
        message: &InboundMessage,
    ) -> Vec<PipelineOutcome> {
        let started = Instant::now();
        let ctx = StageContext::new(user_id, &event.chat.id);

        if event.message_id.trim().is_empty() {
            let failure = StageFailure {
                stage: Stage::Extract,
                reason: "event has no message id".to_string(),
            };
            error!(user_id = %user_id, channel_id = %event.chat.id, "Inbound event missing message id");
            return vec![failure.into()];
        }

        let keywords = match guarded(Stage::Match, ctx, self.stores.keywords.active_keywords(user_id)).await {
            Ok(keywords) => keywords,
            Err(failure) => return vec![failure.into()],
        };
        let matches = self
            .matcher
            .select(message.text(), &keywords, user_id, &event.chat.id);
        if matches.is_empty() {
            debug!(user_id = %user_id, keywords = keywords.len(), "step: no keyword matched, dropped");
            return vec![PipelineOutcome::Dropped(DropReason::Unmatched)];
        }

        let mut outcomes = Vec::with_capacity(matches.len());
        for matched in &matches {
            outcomes.push(self.deliver_match(matched, event, message, started).await);
        }
        outcomes
    }

    async fn deliver_match(
        &self,
        matched: &MatchResult,
        event: &InboundEvent,
        message: &InboundMessage,
        started: Instant,
    ) -> PipelineOutcome {
        let ctx = StageContext::new(&matched.user_id, &matched.channel_id)
            .with_keyword(&matched.keyword_id);
        let text = message.text().unwrap_or_default();
        info!(
            user_id = %matched.user_id,
            keyword_id = %matched.keyword_id,
            "step: keyword matched"
        );

        // Held until the log row exists so a concurrent near-duplicate sees it.
        let guard: Option<OwnedMutexGuard<()>> = if self.config.serialize_dedup {
            Some(self.locks.acquire(&matched.user_id, &matched.keyword_id).await)
        } else {
            None
        };

        let duplicate = guarded(
            Stage::Dedup,
            ctx,
            self.detector
                .is_duplicate(&matched.user_id, &matched.keyword_id, text),
        )
        .await;
        match duplicate {
            Ok(true) => {
                info!(
                    user_id = %matched.user_id,
                    keyword_id = %matched.keyword_id,
                    "step: duplicate, dropped"
                );
                return PipelineOutcome::Dropped(DropReason::Duplicate);
            }
            Ok(false) => {}
            Err(failure) => return failure.into(),
        }

        let log = guarded(
            Stage::Log,
            ctx,
            self.stores.logs.insert_log(NewMessageLog {
                user_id: matched.user_id.clone(),
                keyword_id: matched.keyword_id.clone(),
                channel_id: matched.channel_id.clone(),
                original_message_id: event.message_id.clone(),
                original_message_text: text.to_string(),
                matched_text: matched.matched_text.clone(),
            }),
        )
        .await;
        drop(guard);
        let log = match log {
            Ok(log) => log,
            Err(failure) => return failure.into(),
        };
        info!(log_id = %log.id, "step: message log created");

        let record = contained(
            ctx,
            guarded(
                Stage::Enqueue,
                ctx,
                self.queue.enqueue(NewQueueRecord {
                    user_id: matched.user_id.clone(),
                    channel_id: matched.channel_id.clone(),
                    original_chat_id: event.chat.id.clone(),
                    message_text: text.to_string(),
                    message_type: message.kind(),
                    matched_keywords: vec![matched.matched_text.clone()],
                    raw_message_data: event.raw.clone(),
                }),
            ),
        )
        .await
        .and_then(|record| record);
        let record = match record {
            Ok(record) => record,
            Err(failure) => {
                self.finish_log(&log.id, LogStatus::Failed, started, ctx).await;
                return failure.into();
            }
        };

        let delivery = contained(ctx, self.fan_out(&record, ctx))
            .await
            .and_then(|delivery| delivery);
        match delivery {
            Ok(()) => {
                self.queue.mark_delivered(&record.id).await;
                self.finish_log(&log.id, LogStatus::Success, started, ctx).await;
                info!(
                    queue_id = %record.id,
                    log_id = %log.id,
                    keyword_id = %matched.keyword_id,
                    "step: delivered"
                );
                PipelineOutcome::Delivered {
                    queue_id: record.id,
                    log_id: log.id,
                    keyword_id: matched.keyword_id.clone(),
                }
            }
            Err(failure) => {
                self.queue.mark_failed(&record.id, &failure.reason).await;
                self.finish_log(&log.id, LogStatus::Failed, started, ctx).await;
                failure.into()
            }
        }
    }

    /// Forwards to destinations, then notifies the user's channels. Fails only if there were
    /// destinations and every forward failed, or the user's configuration could not be read.
    async fn fan_out(&self, record: &QueueRecord, ctx: StageContext<'_>) -> std::result::Result<(), StageFailure> {
        let destinations = guarded(
            Stage::Notify,
            ctx,
            self.stores.destinations.active_destinations(&record.user_id),
        )
        .await?;
        let user = guarded(Stage::Notify, ctx, self.stores.users.get_user(&record.user_id))
            .await?
            .unwrap_or_else(|| UserProfile::unlinked(record.user_id.clone()));

        let forward = self.notifier.forward(record, &destinations).await;
        self.notifier.notify_all(record, &user).await;

        if forward.all_failed() {
            let failure = StageFailure {
                stage: Stage::Notify,
                reason: format!("all destinations failed: {}", forward.failure_reason()),
            };
            error!(
                user_id = %ctx.user_id,
                queue_id = %record.id,
                attempted = forward.attempted(),
                reason = %failure.reason,
                "Delivery failed"
            );
            return Err(failure);
        }
        Ok(())
    }

    async fn finish_log(&self, log_id: &str, status: LogStatus, started: Instant, ctx: StageContext<'_>) {
        let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        best_effort(
            Stage::Complete,
            ctx,
            self.stores.logs.update_log_status(log_id, status, Some(elapsed)),
        )
        .await;
    }

    /// Resets a failed record to pending and re-runs forward + fan-out. Returns the final status.
    /// The original message log is left as written.
    #[instrument(skip(self))]
    pub async fn retry_delivery(&self, queue_id: &str) -> Result<QueueStatus> {
        let record = self.queue.retry(queue_id).await?;
        let ctx = StageContext::new(&record.user_id, &record.channel_id);
        let delivery = contained(ctx, self.fan_out(&record, ctx))
            .await
            .and_then(|delivery| delivery);
        match delivery {
            Ok(()) => {
                self.queue.mark_delivered(&record.id).await;
                info!(queue_id = %record.id, "step: retry delivered");
                Ok(QueueStatus::Delivered)
            }
            Err(failure) => {
                self.queue.mark_failed(&record.id, &failure.reason).await;
                Ok(QueueStatus::Failed)
            }
        }
    }

    pub async fn feedback(&self, user_id: &str, signal: FeedbackSignal) -> Result<f64> {
        self.detector.apply_feedback(user_id, signal).await
    }

    pub async fn failed_records(&self, limit: usize) -> Result<Vec<QueueRecord>> {
        self.queue.failed(limit).await
    }
}
