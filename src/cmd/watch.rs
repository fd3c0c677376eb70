//! Live job monitor: `imagineer watch <screen>`.
//!
//! Typed commands (one per line on stdin) drive the poller the way a browser
//! tab would: hiding pauses polling, showing resumes it.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use imagineer::ImagineerClient;
use imagineer::config::Settings;
use imagineer::monitor::{Feed, Monitor, QueueFeed, Screen, ScrapingFeed, TrainingFeed};
use imagineer::poller::{ActivityLevel, PageVisibility};

pub async fn cmd_watch(settings: &Settings, screen: Screen, once: bool) -> Result<()> {
    match screen {
        Screen::Queue => watch::<QueueFeed>(settings, once).await,
        Screen::Training => watch::<TrainingFeed>(settings, once).await,
        Screen::Scraping => watch::<ScrapingFeed>(settings, once).await,
    }
}

async fn watch<F: Feed>(settings: &Settings, once: bool) -> Result<()> {
    let client = ImagineerClient::new(&settings.api)?;
    if once {
        return fetch_once::<F>(&client).await;
    }
    run_live::<F>(client, settings).await
}

async fn fetch_once<F: Feed>(client: &ImagineerClient) -> Result<()> {
    let payload = F::fetch(client)
        .await
        .with_context(|| format!("Failed to fetch {} from {}", F::SCREEN, client.base_url()))?;
    println!("{}", render_line(F::SCREEN, F::classify(Some(&payload)), &F::summarize(&payload)));
    Ok(())
}

async fn run_live<F: Feed>(client: ImagineerClient, settings: &Settings) -> Result<()> {
    let visibility = Arc::new(PageVisibility::new());
    let monitor = Monitor::<F>::start(
        client.clone(),
        settings.poll_config(F::SCREEN),
        visibility.clone(),
    );
    let mut updates = monitor.subscribe();
    let mut auth = monitor.auth_updates();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut auth_pending = true;

    println!(
        "{} {} at {}",
        style("Watching").bold().cyan(),
        style(F::SCREEN).bold(),
        client.base_url()
    );
    println!("{}", style(WatchCommand::HELP).dim());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().clone();
                if let Some(payload) = latest {
                    println!(
                        "{}",
                        render_line(F::SCREEN, F::classify(Some(&payload)), &F::summarize(&payload))
                    );
                }
            }
            changed = auth.changed(), if auth_pending => {
                if changed.is_err() || *auth.borrow_and_update() {
                    auth_pending = false;
                }
                if monitor.needs_admin_auth() {
                    print_auth_banner();
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line.context("Failed to read stdin")? {
                    Some(line) => line,
                    None => {
                        stdin_open = false;
                        continue;
                    }
                };
                let command = match line.parse::<WatchCommand>() {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{}", style(message).yellow());
                        continue;
                    }
                };
                match command {
                    WatchCommand::Refresh => {
                        if !monitor.refresh() {
                            print_auth_banner();
                        }
                    }
                    WatchCommand::Hide => visibility.hide(),
                    WatchCommand::Show => visibility.show(),
                    WatchCommand::TogglePause => {
                        let enabled = !monitor.handle().is_enabled();
                        if monitor.set_enabled(enabled) {
                            println!("{}", style(if enabled { "resumed" } else { "paused" }).dim());
                        } else {
                            print_auth_banner();
                        }
                    }
                    WatchCommand::Status => {
                        let stats = monitor.stats();
                        println!(
                            "state={} tier={} successes={} failures={}{}",
                            monitor.state(),
                            monitor.level(),
                            stats.successes,
                            stats.failures,
                            stats
                                .last_error
                                .map(|e| format!(" last_error=\"{}\"", e))
                                .unwrap_or_default()
                        );
                    }
                    WatchCommand::Help => println!("{}", style(WatchCommand::HELP).dim()),
                    WatchCommand::Quit => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let stats = monitor.stats();
    info!(
        event = "cli.watch.stopped",
        screen = %F::SCREEN,
        successes = stats.successes,
        failures = stats.failures,
    );
    Ok(())
}

fn print_auth_banner() {
    println!(
        "{} polling stopped. Set IMAGINEER_ADMIN_TOKEN or [api] admin_token and restart.",
        style("Admin access required:").red().bold()
    );
}

/// One line of monitor output.
fn render_line(screen: Screen, level: ActivityLevel, summary: &str) -> String {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    let tier = format!("{:<6}", level.as_str());
    let tier = match level {
        ActivityLevel::Active => style(tier).green().bold(),
        ActivityLevel::Medium => style(tier).yellow(),
        ActivityLevel::Idle => style(tier).dim(),
    };
    format!("[{}] {:<8} {} {}", timestamp, screen, tier, summary)
}

/// A line typed on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchCommand {
    Refresh,
    Hide,
    Show,
    TogglePause,
    Status,
    Help,
    Quit,
}

impl WatchCommand {
    const HELP: &'static str =
        "commands: r refresh, h hide, v show, p pause/resume, s status, ? help, q quit";
}

impl FromStr for WatchCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "r" | "refresh" => Ok(Self::Refresh),
            "h" | "hide" => Ok(Self::Hide),
            "v" | "show" => Ok(Self::Show),
            "p" | "pause" | "resume" => Ok(Self::TogglePause),
            "s" | "status" => Ok(Self::Status),
            "?" | "help" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{}' ({})", other, Self::HELP)),
        }
    }
}
