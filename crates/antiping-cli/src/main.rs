// CLI for config checks and offline event replay

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod sink;

mod commands {
    pub mod check_config;
    pub mod replay;
}

#[derive(Parser)]
#[command(name = "antiping")]
#[command(about = "antiping - Spam and mass-mention moderation for chat rooms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "antiping.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective settings
    CheckConfig,

    /// Score newline-delimited JSON events and print one verdict per line
    Replay {
        /// Event file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::CheckConfig => {
            commands::check_config::run(&cli.config)?;
        }
        Commands::Replay { input } => {
            commands::replay::run(&cli.config, input.as_deref()).await?;
        }
    }

    Ok(())
}
