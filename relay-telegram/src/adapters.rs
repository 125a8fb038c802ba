//! Adapter from teloxide messages to relay inbound events.

use chrono::Utc;
use relay_core::{InboundChat, InboundEvent, MediaKind, ToInboundEvent};
use serde::Serialize;
use tracing::warn;

/// Wraps a teloxide Message (private/group message or channel post).
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> ToInboundEvent for TelegramMessageWrapper<'a> {
    fn to_inbound(&self) -> InboundEvent {
        let msg = self.0;
        let raw = raw_message_json(msg, msg.chat.id.0, msg.id.0);
        inbound_from_parts(
            msg.chat.id.0,
            self.chat_type(),
            &msg.id.to_string(),
            msg.text(),
            msg.caption(),
            self.media_kind(),
            raw,
        )
    }
}

/// JSON copy of the update for `raw_message_data`; `Null` (with a warning) if it cannot be
/// serialized.
pub(crate) fn raw_message_json<T: Serialize>(
    msg: &T,
    chat_id: i64,
    message_id: i32,
) -> serde_json::Value {
    serde_json::to_value(msg).unwrap_or_else(|e| {
        warn!(
            chat_id = chat_id,
            message_id = message_id,
            error = %e,
            "Raw message not serializable, stored as null"
        );
        serde_json::Value::Null
    })
}

impl<'a> TelegramMessageWrapper<'a> {
    fn chat_type(&self) -> &'static str {
        let chat = &self.0.chat;
        if chat.is_channel() {
            "channel"
        } else if chat.is_supergroup() {
            "supergroup"
        } else if chat.is_group() {
            "group"
        } else {
            "private"
        }
    }

    /// Photo, video and document are tracked; other media (stickers, voice, ...) map to None.
    fn media_kind(&self) -> Option<MediaKind> {
        let msg = self.0;
        if msg.photo().is_some() {
            Some(MediaKind::Photo)
        } else if msg.video().is_some() {
            Some(MediaKind::Video)
        } else if msg.document().is_some() {
            Some(MediaKind::Document)
        } else if msg.text().is_some() {
            Some(MediaKind::Text)
        } else {
            None
        }
    }
}

/// Builds an [`InboundEvent`] from already-extracted message fields.
pub fn inbound_from_parts(
    chat_id: i64,
    chat_type: &str,
    message_id: &str,
    text: Option<&str>,
    caption: Option<&str>,
    media: Option<MediaKind>,
    raw: serde_json::Value,
) -> InboundEvent {
    InboundEvent {
        chat: InboundChat {
            id: chat_id.to_string(),
            chat_type: chat_type.to_string(),
        },
        message_id: message_id.to_string(),
        text: text.map(str::to_string),
        caption: caption.map(str::to_string),
        media,
        arrived_at: Utc::now(),
        raw,
    }
}
