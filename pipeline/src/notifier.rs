//! Fan-out of a queued record.
//!
//! [`Notifier::forward`] sends the formatted message to each active destination;
//! [`Notifier::notify_all`] runs the direct chat, web feed and email outbox channels
//! concurrently. Every send is settled independently: one failure never cancels a sibling
//! and nothing is raised to the caller.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use relay_core::{
    ChatNotifier, DeliveryChannel, Destination, EmailOutbox, EmailOutboxEntry, FeedEntry,
    FeedStore, QueueRecord, UserProfile,
};
use tracing::{debug, info, instrument, warn};

use crate::format::{email_subject, format_message, truncate_chars};

/// Result of one notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    Skipped(&'static str),
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed(_))
    }
}

impl fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOutcome::Sent => f.write_str("sent"),
            ChannelOutcome::Skipped(why) => write!(f, "skipped ({})", why),
            ChannelOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Outcome of `notify_all`, one entry per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyReport {
    pub direct: ChannelOutcome,
    pub feed: ChannelOutcome,
    pub email: ChannelOutcome,
}

/// Outcome of forwarding to destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    /// (destination id, platform message id)
    pub sent: Vec<(String, String)>,
    /// (destination id, reason)
    pub failed: Vec<(String, String)>,
}

impl ForwardReport {
    pub fn attempted(&self) -> usize {
        self.sent.len() + self.failed.len()
    }

    /// True when there was at least one destination and none accepted the message.
    pub fn all_failed(&self) -> bool {
        self.sent.is_empty() && !self.failed.is_empty()
    }

    pub fn failure_reason(&self) -> String {
        self.failed
            .iter()
            .map(|(id, reason)| format!("{}: {}", id, reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct Notifier {
    channel: Arc<dyn DeliveryChannel>,
    chat: Arc<dyn ChatNotifier>,
    feed: Arc<dyn FeedStore>,
    email: Arc<dyn EmailOutbox>,
    feed_body_limit: usize,
}

impl Notifier {
    pub fn new(
        channel: Arc<dyn DeliveryChannel>,
        chat: Arc<dyn ChatNotifier>,
        feed: Arc<dyn FeedStore>,
        email: Arc<dyn EmailOutbox>,
        feed_body_limit: usize,
    ) -> Self {
        Self {
            channel,
            chat,
            feed,
            email,
            feed_body_limit,
        }
    }

    fn render(record: &QueueRecord) -> String {
        format_message(
            &record.channel_id,
            &record.matched_keywords,
            &record.message_text,
        )
    }

    /// Sends to all destinations concurrently.
    #[instrument(skip(self, record, destinations), fields(queue_id = %record.id))]
    pub async fn forward(&self, record: &QueueRecord, destinations: &[Destination]) -> ForwardReport {
        let text = Self::render(record);
        let sends = destinations.iter().map(|destination| {
            let text = &text;
            async move {
                let result = self.channel.send(destination, text).await;
                (destination, result)
            }
        });

        let mut report = ForwardReport::default();
        for (destination, result) in join_all(sends).await {
            match result {
                Ok(message_id) => {
                    debug!(
                        destination_id = %destination.id,
                        message_id = %message_id,
                        "Forwarded to destination"
                    );
                    report.sent.push((destination.id.clone(), message_id));
                }
                Err(e) => {
                    warn!(
                        destination_id = %destination.id,
                        platform = %destination.platform,
                        error = %e,
                        "Forward to destination failed"
                    );
                    report.failed.push((destination.id.clone(), e.to_string()));
                }
            }
        }
        info!(
            queue_id = %record.id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "step: forward done"
        );
        report
    }

    /// Runs direct chat, feed and email concurrently and waits for all three to settle.
    #[instrument(skip(self, record, user), fields(queue_id = %record.id, user_id = %user.id))]
    pub async fn notify_all(&self, record: &QueueRecord, user: &UserProfile) -> NotifyReport {
        let (direct, feed, email) = tokio::join!(
            self.notify_direct(record, user),
            self.notify_feed(record),
            self.notify_email(record, user),
        );
        info!(
            queue_id = %record.id,
            direct = %direct,
            feed = %feed,
            email = %email,
            "step: notify_all done"
        );
        NotifyReport {
            direct,
            feed,
            email,
        }
    }

    async fn notify_direct(&self, record: &QueueRecord, user: &UserProfile) -> ChannelOutcome {
        let Some(chat_id) = user.telegram_chat_id else {
            info!(user_id = %user.id, "No linked chat, direct notification skipped");
            return ChannelOutcome::Skipped("no linked chat");
        };
        match self.chat.notify_chat(chat_id, &Self::render(record)).await {
            Ok(()) => ChannelOutcome::Sent,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Direct chat notification failed");
                ChannelOutcome::Failed(e.to_string())
            }
        }
    }

    async fn notify_feed(&self, record: &QueueRecord) -> ChannelOutcome {
        let entry = FeedEntry {
            user_id: record.user_id.clone(),
            queue_id: record.id.clone(),
            channel_id: record.channel_id.clone(),
            body: truncate_chars(&record.message_text, self.feed_body_limit),
        };
        match self.feed.insert_feed(entry).await {
            Ok(()) => ChannelOutcome::Sent,
            Err(e) => {
                warn!(queue_id = %record.id, error = %e, "Feed insert failed");
                ChannelOutcome::Failed(e.to_string())
            }
        }
    }

    async fn notify_email(&self, record: &QueueRecord, user: &UserProfile) -> ChannelOutcome {
        if !user.email_notifications {
            return ChannelOutcome::Skipped("email notifications disabled");
        }
        let Some(to_address) = user.email.clone() else {
            return ChannelOutcome::Skipped("no email address");
        };
        let entry = EmailOutboxEntry {
            user_id: record.user_id.clone(),
            queue_id: record.id.clone(),
            to_address,
            subject: email_subject(&record.channel_id, &record.matched_keywords),
            body: Self::render(record),
        };
        match self.email.queue_email(entry).await {
            Ok(()) => ChannelOutcome::Sent,
            Err(e) => {
                warn!(queue_id = %record.id, error = %e, "Email outbox insert failed");
                ChannelOutcome::Failed(e.to_string())
            }
        }
    }
}
