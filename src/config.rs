//! Configuration for the Imagineer monitor.
//!
//! Settings are read from `.imagineer/imagineer.toml` (or `--config`) and
//! layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:10050"
//! admin_token = "..."          # or IMAGINEER_ADMIN_TOKEN
//! request_timeout_secs = 30
//!
//! [polling.queue]
//! active_ms = 2000
//! medium_ms = 10000
//! idle_ms = 30000              # `base_ms` is accepted as an alias
//! pause_when_hidden = true
//! run_immediately = true
//!
//! [polling.training]
//! active_ms = 5000
//!
//! [logging]
//! level = "info"
//! log_dir = ".imagineer/logs"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::normalize_base_url;
use crate::monitor::Screen;
use crate::poller::{PollConfig, TierIntervals, millis};

pub const CONFIG_DIR: &str = ".imagineer";
pub const CONFIG_FILE: &str = "imagineer.toml";

pub const ENV_API_URL: &str = "IMAGINEER_API_URL";
pub const ENV_ADMIN_TOKEN: &str = "IMAGINEER_ADMIN_TOKEN";

const DEFAULT_BASE_URL: &str = "http://localhost:10050";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            admin_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Polling settings for one screen. Unset fields fall back to that
/// screen's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPolling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_ms: Option<u64>,
    #[serde(default, alias = "base_ms", skip_serializing_if = "Option::is_none")]
    pub idle_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_when_hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_immediately: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl ScreenPolling {
    /// Every field filled in with the screen's defaults.
    pub fn defaults_for(screen: Screen) -> Self {
        let intervals = screen.default_intervals();
        Self {
            active_ms: Some(millis(intervals.active)),
            medium_ms: Some(millis(intervals.medium)),
            idle_ms: Some(millis(intervals.idle)),
            pause_when_hidden: Some(true),
            run_immediately: Some(true),
            enabled: Some(true),
        }
    }

    pub fn resolve(&self, screen: Screen) -> PollConfig {
        let defaults = screen.default_intervals();
        let pick = |value: Option<u64>, fallback: Duration| {
            value
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };
        let intervals = TierIntervals::new(
            pick(self.active_ms, defaults.active),
            pick(self.medium_ms, defaults.medium),
            pick(self.idle_ms, defaults.idle),
        );
        PollConfig::default()
            .with_intervals(intervals)
            .with_enabled(self.enabled.unwrap_or(true))
            .with_pause_when_hidden(self.pause_when_hidden.unwrap_or(true))
            .with_run_immediately(self.run_immediately.unwrap_or(true))
    }
}

/// `[polling]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSection {
    #[serde(default)]
    pub queue: ScreenPolling,
    #[serde(default)]
    pub training: ScreenPolling,
    #[serde(default)]
    pub scraping: ScreenPolling,
}

impl PollingSection {
    pub fn for_screen(&self, screen: Screen) -> &ScreenPolling {
        match screen {
            Screen::Queue => &self.queue,
            Screen::Training => &self.training,
            Screen::Scraping => &self.scraping,
        }
    }

    /// A section with every screen's defaults written out.
    pub fn explicit_defaults() -> Self {
        Self {
            queue: ScreenPolling::defaults_for(Screen::Queue),
            training: ScreenPolling::defaults_for(Screen::Training),
            scraping: ScreenPolling::defaults_for(Screen::Scraping),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter when `RUST_LOG` is unset (e.g. "info", "imagineer=debug").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Write JSON logs to a daily-rotated file in this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl LoggingSection {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// The complete imagineer.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagineerToml {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ImagineerToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse imagineer.toml")
    }

    /// Returns the default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize imagineer.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The file `config init` writes: defaults with every polling knob visible.
    pub fn template() -> Self {
        Self {
            polling: PollingSection::explicit_defaults(),
            ..Self::default()
        }
    }

    pub fn poll_config(&self, screen: Screen) -> PollConfig {
        self.polling.for_screen(screen).resolve(screen)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = normalize_base_url(&self.api.base_url) {
            warnings.push(e.to_string());
        }
        if self.api.request_timeout_secs == 0 {
            warnings.push("api.request_timeout_secs is 0; requests would fail immediately".to_string());
        }

        for screen in Screen::ALL {
            let polling = self.polling.for_screen(screen);
            for (field, value) in [
                ("active_ms", polling.active_ms),
                ("medium_ms", polling.medium_ms),
                ("idle_ms", polling.idle_ms),
            ] {
                if value == Some(0) {
                    warnings.push(format!(
                        "polling.{}.{} is 0; the screen default will be used instead",
                        screen, field
                    ));
                }
            }

            let resolved = polling.resolve(screen).intervals;
            if resolved.active > resolved.medium || resolved.medium > resolved.idle {
                warnings.push(format!(
                    "polling.{} intervals are not ordered active <= medium <= idle ({}ms, {}ms, {}ms)",
                    screen,
                    resolved.active.as_millis(),
                    resolved.medium.as_millis(),
                    resolved.idle.as_millis()
                ));
            }
        }

        warnings
    }
}

/// Connection settings after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub admin_token: Option<String>,
    pub request_timeout: Duration,
}

impl ApiSettings {
    /// CLI → environment → file → default.
    pub fn resolve(
        section: &ApiSection,
        cli_api_url: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let base_url = cli_api_url
            .map(str::to_string)
            .or_else(|| env(ENV_API_URL))
            .unwrap_or_else(|| section.base_url.clone());
        let admin_token = env(ENV_ADMIN_TOKEN)
            .or_else(|| section.admin_token.clone())
            .filter(|token| !token.trim().is_empty());

        Self {
            base_url,
            admin_token,
            request_timeout: Duration::from_secs(section.request_timeout_secs),
        }
    }
}

/// Runtime configuration: the parsed file plus environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub toml: ImagineerToml,
    pub api: ApiSettings,
    pub verbose: bool,
}

impl Settings {
    pub fn load(
        project_dir: &Path,
        config_path: Option<PathBuf>,
        cli_api_url: Option<&str>,
        verbose: bool,
    ) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(|| default_config_path(project_dir));
        let toml = ImagineerToml::load_or_default(&config_path)?;
        let api = ApiSettings::resolve(&toml.api, cli_api_url, |key| std::env::var(key).ok());

        Ok(Self {
            config_path,
            toml,
            api,
            verbose,
        })
    }

    pub fn poll_config(&self, screen: Screen) -> PollConfig {
        self.toml.poll_config(screen)
    }
}

pub fn config_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR)
}

pub fn default_config_path(project_dir: &Path) -> PathBuf {
    config_dir(project_dir).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let toml = ImagineerToml::parse("").unwrap();
        assert_eq!(toml.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(toml.api.request_timeout_secs, 30);
        assert_eq!(toml.logging.level(), "info");
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_partial_screen_section_falls_back_per_screen() {
        let toml = ImagineerToml::parse(
            r#"
            [polling.training]
            active_ms = 1500
            pause_when_hidden = false
            "#,
        )
        .unwrap();

        let training = toml.poll_config(Screen::Training);
        let defaults = Screen::Training.default_intervals();
        assert_eq!(training.intervals.active, Duration::from_millis(1500));
        assert_eq!(training.intervals.medium, defaults.medium);
        assert_eq!(training.intervals.idle, defaults.idle);
        assert!(!training.pause_when_hidden);
        assert!(training.run_immediately);

        let queue = toml.poll_config(Screen::Queue);
        assert_eq!(queue.intervals, Screen::Queue.default_intervals());
    }

    #[test]
    fn test_base_ms_is_alias_for_idle_ms() {
        let toml = ImagineerToml::parse(
            r#"
            [polling.scraping]
            base_ms = 45000
            "#,
        )
        .unwrap();
        assert_eq!(toml.polling.scraping.idle_ms, Some(45_000));
        assert_eq!(
            toml.poll_config(Screen::Scraping).intervals.idle,
            Duration::from_millis(45_000)
        );
    }

    #[test]
    fn test_validate_flags_zero_and_unordered_intervals() {
        let toml = ImagineerToml::parse(
            r#"
            [api]
            base_url = "localhost:10050"

            [polling.queue]
            active_ms = 0

            [polling.training]
            active_ms = 90000
            medium_ms = 10000
            "#,
        )
        .unwrap();
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("scheme")));
        assert!(warnings.iter().any(|w| w.contains("polling.queue.active_ms is 0")));
        assert!(warnings.iter().any(|w| w.contains("polling.training intervals")));
    }

    #[test]
    fn test_api_settings_precedence() {
        let section = ApiSection {
            base_url: "http://file:1".to_string(),
            admin_token: Some("file-token".to_string()),
            request_timeout_secs: 12,
        };

        let from_file = ApiSettings::resolve(&section, None, env_from(&[]));
        assert_eq!(from_file.base_url, "http://file:1");
        assert_eq!(from_file.admin_token.as_deref(), Some("file-token"));
        assert_eq!(from_file.request_timeout, Duration::from_secs(12));

        let env = env_from(&[(ENV_API_URL, "http://env:2"), (ENV_ADMIN_TOKEN, "env-token")]);
        let from_env = ApiSettings::resolve(&section, None, &env);
        assert_eq!(from_env.base_url, "http://env:2");
        assert_eq!(from_env.admin_token.as_deref(), Some("env-token"));

        let from_cli = ApiSettings::resolve(&section, Some("http://cli:3"), &env);
        assert_eq!(from_cli.base_url, "http://cli:3");
    }

    #[test]
    fn test_blank_admin_token_is_ignored() {
        let section = ApiSection {
            admin_token: Some("  ".to_string()),
            ..ApiSection::default()
        };
        let settings = ApiSettings::resolve(&section, None, env_from(&[]));
        assert_eq!(settings.admin_token, None);
    }

    #[test]
    fn test_template_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        ImagineerToml::template().save(&path).unwrap();
        let loaded = ImagineerToml::load(&path).unwrap();

        assert_eq!(loaded.polling, PollingSection::explicit_defaults());
        assert!(loaded.validate().is_empty());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = ImagineerToml::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(toml.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[api\nbase_url = ").unwrap();
        let err = ImagineerToml::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse imagineer.toml"));
    }

    #[test]
    fn test_settings_load_uses_explicit_config_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[api]\nrequest_timeout_secs = 7\n").unwrap();

        let settings =
            Settings::load(dir.path(), Some(path.clone()), Some("http://cli:9"), true).unwrap();
        assert_eq!(settings.config_path, path);
        assert_eq!(settings.api.base_url, "http://cli:9");
        assert_eq!(settings.api.request_timeout, Duration::from_secs(7));
        assert!(settings.verbose);
    }
}
