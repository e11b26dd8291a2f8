use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use tracing_subscriber::EnvFilter;

mod api;
mod app;
mod config;
mod controller;
mod identity;
mod store;
mod text;
mod ui;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Terminal chat widget for hosted chat backends", long_about = None)]
struct Cli {
    /// Override the chat backend base URL for this run
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print this installation's client id
    Id,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.base_url = endpoint;
    }

    init_logging(&config)?;

    match cli.command {
        Some(Commands::Id) => {
            let id = identity::load_or_create(&config.parley_home)?;
            println!("{}", id);
        }
        Some(Commands::Config) => {
            let content = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", content);
        }
        None => {
            app::run(config).await?;
        }
    }

    Ok(())
}

/// Log to a file under the app home; the TUI owns stdout.
fn init_logging(config: &Config) -> Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
