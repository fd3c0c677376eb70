use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use imagineer::config::Settings;
use imagineer::monitor::Screen;

mod cmd;

#[derive(Parser)]
#[command(name = "imagineer")]
#[command(version, about = "Live terminal monitor for Imagineer generation, training and scraping jobs")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to imagineer.toml (defaults to .imagineer/imagineer.toml in the project dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL. Overrides IMAGINEER_API_URL and imagineer.toml
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch one screen's jobs, polling faster while they are busy
    Watch {
        #[arg(value_enum)]
        screen: Screen,

        /// Fetch once, print a summary and exit
        #[arg(long)]
        once: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default imagineer.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Config { command } => cmd::cmd_config(
            &project_dir,
            cli.config.clone(),
            cli.api_url.as_deref(),
            command.clone(),
        )?,
        Commands::Watch { screen, once } => {
            let settings = Settings::load(
                &project_dir,
                cli.config.clone(),
                cli.api_url.as_deref(),
                cli.verbose,
            )?;
            let _log_guard = imagineer::logging::init(settings.verbose, &settings.toml.logging);
            tracing::debug!(
                event = "cli.config.loaded",
                path = %settings.config_path.display(),
                base_url = %settings.api.base_url,
            );
            cmd::cmd_watch(&settings, *screen, *once).await?;
        }
    }

    Ok(())
}
