//! Pipeline configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::matcher::MatchPolicy;

pub const MIN_THRESHOLD: f64 = 0.6;
pub const MAX_THRESHOLD: f64 = 0.9;

/// Tunables for duplicate detection, fan-out and keyword selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub dedup_window_hours: i64,
    pub dedup_history_limit: usize,
    /// Threshold used when the user has no stored value.
    pub default_threshold: f64,
    /// Max characters of the web-feed body.
    pub feed_body_limit: usize,
    /// Hold a per-(user, keyword) lock from the duplicate check until the log row exists.
    pub serialize_dedup: bool,
    pub match_policy: MatchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_window_hours: 24,
            dedup_history_limit: 50,
            default_threshold: 0.8,
            feed_body_limit: 500,
            serialize_dedup: true,
            match_policy: MatchPolicy::FirstMatch,
        }
    }
}

impl PipelineConfig {
    /// Reads `DEDUP_*`, `FEED_BODY_LIMIT` and `MATCH_POLICY`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            dedup_window_hours: env_or("DEDUP_WINDOW_HOURS", defaults.dedup_window_hours)?,
            dedup_history_limit: env_or("DEDUP_HISTORY_LIMIT", defaults.dedup_history_limit)?,
            default_threshold: env_or("DEDUP_DEFAULT_THRESHOLD", defaults.default_threshold)?,
            feed_body_limit: env_or("FEED_BODY_LIMIT", defaults.feed_body_limit)?,
            serialize_dedup: env_or("DEDUP_SERIALIZE", defaults.serialize_dedup)?,
            match_policy: env_or("MATCH_POLICY", defaults.match_policy)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dedup_window_hours <= 0 {
            bail!("DEDUP_WINDOW_HOURS must be positive, got {}", self.dedup_window_hours);
        }
        if self.dedup_history_limit == 0 {
            bail!("DEDUP_HISTORY_LIMIT must be at least 1");
        }
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&self.default_threshold) {
            bail!(
                "DEDUP_DEFAULT_THRESHOLD must be within [{}, {}], got {}",
                MIN_THRESHOLD,
                MAX_THRESHOLD,
                self.default_threshold
            );
        }
        if self.feed_body_limit == 0 {
            bail!("FEED_BODY_LIMIT must be at least 1");
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        _ => Ok(default),
    }
}
