//! Configuration view and validation commands: `imagineer config`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use imagineer::config::{ImagineerToml, Settings, default_config_path};
use imagineer::monitor::Screen;

use super::super::ConfigCommands;

pub fn cmd_config(
    project_dir: &Path,
    config_path: Option<PathBuf>,
    cli_api_url: Option<&str>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = config_path.unwrap_or_else(|| default_config_path(project_dir));

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Imagineer Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No imagineer.toml found at {}", config_path.display());
                println!("Using defaults. Run 'imagineer config init' to create one.");
            }
            println!();

            let settings = Settings::load(project_dir, Some(config_path), cli_api_url, false)?;

            println!("[api]");
            println!("  base_url = \"{}\"", settings.api.base_url);
            println!(
                "  admin_token = {}",
                if settings.api.admin_token.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!(
                "  request_timeout_secs = {}",
                settings.api.request_timeout.as_secs()
            );
            println!();

            for screen in Screen::ALL {
                let poll = settings.poll_config(screen);
                println!("[polling.{}]", screen);
                println!("  active_ms = {}", poll.intervals.active.as_millis());
                println!("  medium_ms = {}", poll.intervals.medium.as_millis());
                println!("  idle_ms = {}", poll.intervals.idle.as_millis());
                println!("  pause_when_hidden = {}", poll.pause_when_hidden);
                println!("  run_immediately = {}", poll.run_immediately);
                println!("  enabled = {}", poll.enabled);
                println!();
            }

            println!("[logging]");
            println!("  level = \"{}\"", settings.toml.logging.level());
            if let Some(dir) = &settings.toml.logging.log_dir {
                println!("  log_dir = \"{}\"", dir.display());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No imagineer.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = ImagineerToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                println!("imagineer.toml already exists at {}", config_path.display());
                println!("Pass --force to overwrite it.");
                return Ok(());
            }

            if let Some(dir) = config_path.parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }

            ImagineerToml::template().save(&config_path)?;

            println!("Created imagineer.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [api] base_url, admin_token, request_timeout_secs");
            println!("  - [polling.<screen>] active_ms, medium_ms, idle_ms, pause_when_hidden");
            println!("  - [logging] level, log_dir");
            println!();
        }
    }

    Ok(())
}
