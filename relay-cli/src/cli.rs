//! CLI parser.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Telegram keyword relay: run, retry, feedback, failed", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the relay (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Reset a failed queue record to pending and deliver it again.
    Retry {
        queue_id: String,
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Adjust a user's duplicate threshold: too_many_duplicates | missed_duplicates.
    Feedback { user_id: String, signal: String },
    /// List failed queue records, newest first.
    Failed {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}
