//! Wiring of store, registry, bot and orchestrator, and the subcommand bodies.

use std::sync::Arc;

use anyhow::{Context, Result};
use pipeline::{ChannelRegistry, DeliveryQueue, DuplicateDetector, Orchestrator, Stores};
use relay_core::{
    ChatNotifier, DeliveryChannel, FeedbackSignal, QueueRecord, QueueStatus, SubscriptionStore,
    TelegramBot,
};
use relay_telegram::{run_dispatcher, TelegramConfig};
use storage::SqliteStore;
use tracing::info;

use crate::config::RelayConfig;

pub async fn open_store(database_url: &str) -> Result<SqliteStore> {
    SqliteStore::new(database_url)
        .await
        .with_context(|| format!("Open database {}", database_url))
}

/// Orchestrator over `store` with the registry seeded from stored subscriptions.
pub async fn build_orchestrator(
    store: &SqliteStore,
    config: &RelayConfig,
    channel: Arc<dyn DeliveryChannel>,
    chat: Arc<dyn ChatNotifier>,
) -> Result<Orchestrator> {
    let subscriptions = store
        .active_subscriptions()
        .await
        .context("Load monitored channels")?;
    let registry = Arc::new(ChannelRegistry::from_subscriptions(&subscriptions));
    info!(
        subscriptions = subscriptions.len(),
        channels = registry.channels().len(),
        "Channel registry seeded"
    );
    Ok(Orchestrator::new(
        Stores::from_shared(Arc::new(store.clone())),
        registry,
        channel,
        chat,
        config.pipeline.clone(),
    ))
}

pub async fn run(config: &RelayConfig, token: Option<String>) -> Result<()> {
    let telegram = TelegramConfig::from_env(token)?;
    let store = open_store(&config.database_url).await?;
    let bot = telegram.build_bot();
    let sender = Arc::new(TelegramBot::from_bot(bot.clone()));
    let orchestrator = build_orchestrator(&store, config, sender.clone(), sender).await?;

    info!(
        database_url = %config.database_url,
        match_policy = %config.pipeline.match_policy,
        "Relay started"
    );
    run_dispatcher(bot, Arc::new(orchestrator)).await
}

pub async fn retry(config: &RelayConfig, queue_id: &str, token: Option<String>) -> Result<QueueStatus> {
    let telegram = TelegramConfig::from_env(token)?;
    let store = open_store(&config.database_url).await?;
    let sender = Arc::new(TelegramBot::from_bot(telegram.build_bot()));
    let orchestrator = build_orchestrator(&store, config, sender.clone(), sender).await?;
    let status = orchestrator
        .retry_delivery(queue_id)
        .await
        .with_context(|| format!("Retry queue record {}", queue_id))?;
    Ok(status)
}

pub async fn feedback(store: &SqliteStore, config: &RelayConfig, user_id: &str, signal: &str) -> Result<f64> {
    let signal: FeedbackSignal = signal.parse()?;
    let shared = Arc::new(store.clone());
    let detector = DuplicateDetector::new(shared.clone(), shared, &config.pipeline);
    Ok(detector.apply_feedback(user_id, signal).await?)
}

pub async fn failed(store: &SqliteStore, limit: usize) -> Result<Vec<QueueRecord>> {
    let queue = DeliveryQueue::new(Arc::new(store.clone()));
    Ok(queue.failed(limit).await?)
}

const TEXT_PREVIEW_LEN: usize = 60;

pub fn print_failed(records: &[QueueRecord]) {
    if records.is_empty() {
        println!("No failed records.");
        return;
    }
    println!(
        "{:<36} {:<20} {:<12} {:<16} {}",
        "id", "created_at", "user_id", "channel_id", "reason / text"
    );
    println!("{}", "-".repeat(120));
    for r in records {
        let preview: String = r
            .message_text
            .chars()
            .take(TEXT_PREVIEW_LEN)
            .collect::<String>()
            .replace('\n', " ");
        println!(
            "{:<36} {:<20} {:<12} {:<16} {} | {}",
            r.id,
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.user_id,
            r.channel_id,
            r.failure_reason.as_deref().unwrap_or("-"),
            preview
        );
    }
}
