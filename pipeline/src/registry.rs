//! Monitored chat subscriptions, keyed by source chat id.
//!
//! Passed to the orchestrator at construction; seeded from the subscription store at startup.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use relay_core::MonitoredChannel;

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    /// chat id -> subscribed user ids, in registration order
    channels: RwLock<HashMap<String, Vec<String>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_subscriptions(subscriptions: &[MonitoredChannel]) -> Self {
        let registry = Self::new();
        for sub in subscriptions {
            registry.add(&sub.chat_id, &sub.user_id);
        }
        registry
    }

    /// Subscribes a user to a chat. Returns false if already subscribed.
    pub fn add(&self, chat_id: &str, user_id: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let users = channels.entry(chat_id.to_string()).or_default();
        if users.iter().any(|u| u == user_id) {
            return false;
        }
        users.push(user_id.to_string());
        true
    }

    /// Unsubscribes a user; the chat entry is dropped with its last subscriber.
    pub fn remove(&self, chat_id: &str, user_id: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let Some(users) = channels.get_mut(chat_id) else {
            return false;
        };
        let before = users.len();
        users.retain(|u| u != user_id);
        let removed = users.len() != before;
        if users.is_empty() {
            channels.remove(chat_id);
        }
        removed
    }

    pub fn remove_channel(&self, chat_id: &str) -> bool {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(chat_id)
            .is_some()
    }

    pub fn subscribers(&self, chat_id: &str) -> Vec<String> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(chat_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_monitored(&self, chat_id: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(chat_id)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
