//! Dispatcher loop: converts messages and channel posts to inbound events and hands them to
//! the orchestrator.
//!
//! teloxide runs updates of one chat sequentially and different chats concurrently; the
//! orchestrator is awaited inline so per-chat arrival order is the processing start order.

use std::sync::Arc;

use anyhow::Result;
use pipeline::{Orchestrator, PipelineOutcome};
use relay_core::ToInboundEvent;
use teloxide::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::adapters::TelegramMessageWrapper;

#[instrument(skip(bot, orchestrator))]
pub async fn run_dispatcher(bot: Bot, orchestrator: Arc<Orchestrator>) -> Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = ?me.user.username, "Bot identity resolved"),
        Err(e) => warn!(error = %e, "get_me failed, continuing"),
    }
    info!(
        channels = orchestrator.registry().channels().len(),
        "step: dispatcher starting"
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![orchestrator])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("step: dispatcher stopped");
    Ok(())
}

async fn handle_message(msg: Message, orchestrator: Arc<Orchestrator>) -> ResponseResult<()> {
    let event = TelegramMessageWrapper(&msg).to_inbound();
    debug!(
        chat_id = %event.chat.id,
        chat_type = %event.chat.chat_type,
        message_id = %event.message_id,
        "Received message"
    );

    let outcomes = orchestrator.handle_event(&event).await;
    for outcome in &outcomes {
        if let PipelineOutcome::Failed { stage, reason } = &outcome.outcome {
            warn!(
                user_id = %outcome.user_id,
                chat_id = %event.chat.id,
                stage = %stage,
                reason = %reason,
                "Message not delivered"
            );
        }
    }
    Ok(())
}
