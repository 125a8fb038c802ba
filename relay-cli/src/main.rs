//! relay CLI: run the keyword relay, retry failed deliveries, adjust duplicate threshold,
//! list failed records. Config from env (and `.env`) plus CLI args.

use anyhow::Result;
use clap::Parser;
use relay_cli::{app, Cli, Commands, RelayConfig};
use relay_core::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = RelayConfig::load()?;
    init_tracing(Some(config.log_file.as_str()))?;

    match cli.command {
        Commands::Run { token } => app::run(&config, token).await,
        Commands::Retry { queue_id, token } => {
            let status = app::retry(&config, &queue_id, token).await?;
            println!("Queue record {}: {}", queue_id, status);
            Ok(())
        }
        Commands::Feedback { user_id, signal } => {
            let store = app::open_store(&config.database_url).await?;
            let threshold = app::feedback(&store, &config, &user_id, &signal).await?;
            println!("Duplicate threshold for {}: {:.2}", user_id, threshold);
            Ok(())
        }
        Commands::Failed { limit } => {
            let store = app::open_store(&config.database_url).await?;
            let records = app::failed(&store, limit).await?;
            app::print_failed(&records);
            Ok(())
        }
    }
}
