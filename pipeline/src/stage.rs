//! Error boundary around pipeline stages.
//!
//! [`guarded`] runs a fallible stage and turns its error into a [`StageFailure`] logged with
//! user/channel/keyword context. [`best_effort`] does the same for bookkeeping writes whose
//! failure must not change the outcome. [`contained`] catches a panic inside a stage so the
//! caller can still settle the rows it already wrote.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Match,
    Dedup,
    Log,
    Enqueue,
    Notify,
    Complete,
    /// Anything escaping the per-stage boundaries (e.g. a panic).
    Pipeline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Match => "match",
            Stage::Dedup => "dedup",
            Stage::Log => "log",
            Stage::Enqueue => "enqueue",
            Stage::Notify => "notify",
            Stage::Complete => "complete",
            Stage::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers attached to every stage log line.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub user_id: &'a str,
    pub channel_id: &'a str,
    pub keyword_id: Option<&'a str>,
}

impl<'a> StageContext<'a> {
    pub fn new(user_id: &'a str, channel_id: &'a str) -> Self {
        Self {
            user_id,
            channel_id,
            keyword_id: None,
        }
    }

    pub fn with_keyword(self, keyword_id: &'a str) -> Self {
        Self {
            keyword_id: Some(keyword_id),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.reason)
    }
}

pub async fn guarded<T, E, F>(stage: Stage, ctx: StageContext<'_>, fut: F) -> Result<T, StageFailure>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    fut.await.map_err(|e| {
        error!(
            stage = %stage,
            user_id = %ctx.user_id,
            channel_id = %ctx.channel_id,
            keyword_id = ?ctx.keyword_id,
            error = %e,
            "Pipeline stage failed"
        );
        StageFailure {
            stage,
            reason: e.to_string(),
        }
    })
}

/// Returns whether the write succeeded; failures are only logged.
pub async fn best_effort<E, F>(stage: Stage, ctx: StageContext<'_>, fut: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    match fut.await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                stage = %stage,
                user_id = %ctx.user_id,
                channel_id = %ctx.channel_id,
                keyword_id = ?ctx.keyword_id,
                error = %e,
                "Best-effort write failed"
            );
            false
        }
    }
}

/// Runs `fut` and reports a panic as a [`Stage::Pipeline`] failure.
pub async fn contained<T, F>(ctx: StageContext<'_>, fut: F) -> Result<T, StageFailure>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(value) => Ok(value),
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            error!(
                user_id = %ctx.user_id,
                channel_id = %ctx.channel_id,
                keyword_id = ?ctx.keyword_id,
                reason = %reason,
                "Pipeline stage panicked"
            );
            Err(StageFailure {
                stage: Stage::Pipeline,
                reason,
            })
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
