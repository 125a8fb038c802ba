//! # pipeline
//!
//! Matching, duplicate suppression and fan-out delivery for inbound chat events.
//!
//! - [`matcher`]: per-keyword match decision and keyword selection policy
//! - [`dedup`] / [`normalize`]: Persian-aware near-duplicate detection with adaptive threshold
//! - [`queue`]: delivery queue status transitions
//! - [`notifier`]: destination forwards and direct/feed/email fan-out
//! - [`orchestrator`]: the per-event state machine and its error boundary

pub mod config;
pub mod dedup;
pub mod format;
pub mod locks;
pub mod matcher;
pub mod normalize;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod registry;
pub mod stage;

pub use config::PipelineConfig;
pub use dedup::{similarity, DuplicateDetector};
pub use format::format_message;
pub use matcher::{find_match, matches, KeywordMatcher, MatchPolicy};
pub use normalize::canonical_form;
pub use notifier::{ChannelOutcome, ForwardReport, Notifier, NotifyReport};
pub use orchestrator::{DropReason, EventOutcome, Orchestrator, PipelineOutcome, Stores};
pub use queue::DeliveryQueue;
pub use registry::ChannelRegistry;
pub use stage::{Stage, StageFailure};
