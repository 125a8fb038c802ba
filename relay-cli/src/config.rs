//! Application config: database, log file and pipeline tunables, loaded from the environment.

use anyhow::{Context, Result};
use pipeline::PipelineConfig;
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "./relay.db";
pub const DEFAULT_LOG_FILE: &str = "logs/relay.log";

pub struct RelayConfig {
    pub database_url: String,
    pub log_file: String,
    pub pipeline: PipelineConfig,
}

impl RelayConfig {
    /// Reads DATABASE_URL, LOG_FILE and the pipeline variables. The bot token is loaded
    /// separately since only `run` and `retry` talk to Telegram.
    pub fn load() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let log_file = env::var("LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        let pipeline = PipelineConfig::from_env().context("Load pipeline config")?;
        Ok(Self {
            database_url,
            log_file,
            pipeline,
        })
    }
}
