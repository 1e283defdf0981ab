use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use porto_events::config::AppConfig;
use porto_events::models::Category;
use porto_events::{collect_from_config, logging, open_store, publish_from_config};

#[derive(Parser)]
#[command(name = "porto-events")]
#[command(about = "Collects Porto events and publishes curated ones to Telegram")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "configs/config.toml")]
    config_path: PathBuf,

    /// Overrides the configured log level (0 panic .. 6 trace)
    #[arg(long)]
    log_level: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every configured source and store new events
    Collect,
    /// Send events queued for publication
    Publish,
    /// Print stored events, oldest first
    List {
        /// Only events in this category (0 new, 1 publish, 2 published, 3 blocked)
        #[arg(long)]
        category: Option<u8>,
    },
    /// Move an event to another category
    Move { id: String, category: u8 },
    /// Remove an event
    Delete { id: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_path)
        .with_context(|| format!("loading {}", cli.config_path.display()))?;
    logging::init(cli.log_level.unwrap_or(config.log_level));

    let store = open_store(&config);
    info!(
        database = %config.database_path().display(),
        production = config.production_mode,
        "store opened"
    );

    match cli.command {
        Commands::Collect => {
            let report = collect_from_config(&config, &store).with_context(|| {
                format!("loading sources from {}", config.sources_list_path.display())
            })?;
            println!("collected {} events, {} new", report.collected, report.added);
        }
        Commands::Publish => {
            let report = publish_from_config(&config, &store).context("telegram channel")?;
            println!("sent {}, failed {}", report.sent, report.failed);
        }
        Commands::List { category } => {
            let category = category.map(Category::try_from).transpose()?;
            for event in store.list(category) {
                println!(
                    "{}\t{}\t{}\t{}",
                    event.id,
                    event.category,
                    event.timestamp.format("%Y-%m-%d %H:%M"),
                    event.title
                );
            }
        }
        Commands::Move { id, category } => {
            if !store.change_category(&id, category) {
                bail!("could not move event {id} to category {category}");
            }
        }
        Commands::Delete { id } => {
            if !store.delete(&id) {
                bail!("could not delete event {id}");
            }
        }
    }

    Ok(())
}
