//! Duplicate detection over the trailing window of a user's message logs.
//!
//! A candidate is a duplicate of a logged message for the same (user, keyword) when the
//! Jaro-Winkler similarity of their canonical forms reaches the user's threshold. The threshold
//! is adjusted by explicit feedback within [`MIN_THRESHOLD`, `MAX_THRESHOLD`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use relay_core::{FeedbackSignal, LogStore, Result, SettingsStore};
use tracing::{debug, info, instrument};

use crate::config::{PipelineConfig, MAX_THRESHOLD, MIN_THRESHOLD};
use crate::normalize::canonical_form;

/// Threshold change per feedback signal.
pub const FEEDBACK_STEP: f64 = 0.05;

/// Similarity in [0, 1] between two texts after canonicalisation.
///
/// Empty canonical forms score 0 so blank or stopword-only texts are never duplicates.
pub fn similarity(a: &str, b: &str) -> f64 {
    canonical_similarity(&canonical_form(a), &canonical_form(b))
}

fn canonical_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Fixed argument order keeps the score symmetric.
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    strsim::jaro_winkler(first, second)
}

/// Threshold after applying `signal` to `current`, clamped and rounded to two decimals.
pub fn adjusted_threshold(current: f64, signal: FeedbackSignal) -> f64 {
    let next = match signal {
        FeedbackSignal::TooManyDuplicates => current + FEEDBACK_STEP,
        FeedbackSignal::MissedDuplicates => current - FEEDBACK_STEP,
    };
    let rounded = (next * 100.0).round() / 100.0;
    rounded.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Decides whether a candidate was already processed recently for the same user and keyword.
pub struct DuplicateDetector {
    logs: Arc<dyn LogStore>,
    settings: Arc<dyn SettingsStore>,
    window: Duration,
    history_limit: usize,
    default_threshold: f64,
}

impl DuplicateDetector {
    pub fn new(
        logs: Arc<dyn LogStore>,
        settings: Arc<dyn SettingsStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            logs,
            settings,
            window: Duration::hours(config.dedup_window_hours),
            history_limit: config.dedup_history_limit,
            default_threshold: config.default_threshold,
        }
    }

    /// Effective threshold for the user (stored value or the configured default).
    pub async fn threshold(&self, user_id: &str) -> Result<f64> {
        let stored = self.settings.dedup_threshold(user_id).await?;
        Ok(stored.unwrap_or(self.default_threshold))
    }

    /// Store errors propagate: an unreadable history is never treated as "not a duplicate".
    #[instrument(skip(self, candidate_text))]
    pub async fn is_duplicate(
        &self,
        user_id: &str,
        keyword_id: &str,
        candidate_text: &str,
    ) -> Result<bool> {
        let candidate = canonical_form(candidate_text);
        if candidate.is_empty() {
            debug!(user_id = %user_id, keyword_id = %keyword_id, "Empty canonical candidate, not a duplicate");
            return Ok(false);
        }

        let since = Utc::now() - self.window;
        let history = self
            .logs
            .recent_log_texts(user_id, keyword_id, since, self.history_limit)
            .await?;
        if history.is_empty() {
            return Ok(false);
        }

        let threshold = self.threshold(user_id).await?;
        for previous in &history {
            let score = canonical_similarity(&candidate, &canonical_form(previous));
            if score >= threshold {
                info!(
                    user_id = %user_id,
                    keyword_id = %keyword_id,
                    score = score,
                    threshold = threshold,
                    "Duplicate detected"
                );
                return Ok(true);
            }
        }
        debug!(
            user_id = %user_id,
            keyword_id = %keyword_id,
            compared = history.len(),
            "No duplicate in window"
        );
        Ok(false)
    }

    /// Applies a feedback signal, persists and returns the new threshold.
    #[instrument(skip(self))]
    pub async fn apply_feedback(&self, user_id: &str, signal: FeedbackSignal) -> Result<f64> {
        let current = self.threshold(user_id).await?;
        let next = adjusted_threshold(current, signal);
        self.settings.set_dedup_threshold(user_id, next).await?;
        info!(
            user_id = %user_id,
            signal = ?signal,
            previous = current,
            threshold = next,
            "Duplicate threshold adjusted"
        );
        Ok(next)
    }
}
