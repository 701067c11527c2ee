use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::TimeDelta;
use serde::Deserialize;

use crate::paths;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub tasks_file: Option<PathBuf>,
    pub completion_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_window")]
    pub window_minutes: i64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

fn default_poll_interval() -> u64 {
    15
}
fn default_window() -> i64 {
    60
}
fn default_shutdown_timeout() -> u64 {
    1000
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            window_minutes: default_window(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl ReminderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn window(&self) -> TimeDelta {
        TimeDelta::minutes(self.window_minutes)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Program to run instead of the platform default.
    pub command: Option<String>,
}

fn default_app_name() -> String {
    "taskbell".into()
}
fn default_timeout() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            timeout_secs: default_timeout(),
            command: None,
        }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => Self::load_from(&paths::config_path()),
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.reminders.poll_interval_secs == 0 {
            bail!(
                "failed to parse {}: reminders.poll_interval_secs must be at least 1",
                path.display()
            );
        }
        if self.reminders.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            bail!(
                "failed to parse {}: reminders.poll_interval_secs must be at most {MAX_POLL_INTERVAL_SECS}",
                path.display()
            );
        }
        if self.reminders.window_minutes <= 0 {
            bail!(
                "failed to parse {}: reminders.window_minutes must be positive",
                path.display()
            );
        }
        if self.reminders.window_minutes > MAX_WINDOW_MINUTES {
            bail!(
                "failed to parse {}: reminders.window_minutes must be at most {MAX_WINDOW_MINUTES}",
                path.display()
            );
        }
        if self.notifications.app_name.trim().is_empty() {
            bail!(
                "failed to parse {}: notifications.app_name must not be empty",
                path.display()
            );
        }
        Ok(())
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.storage.tasks_file.clone().unwrap_or_else(paths::tasks_path)
    }

    pub fn completion_log(&self) -> PathBuf {
        self.storage
            .completion_log
            .clone()
            .unwrap_or_else(paths::completion_log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.reminders.poll_interval_secs, 15);
        assert_eq!(config.reminders.window(), TimeDelta::hours(1));
        assert_eq!(config.reminders.shutdown_timeout(), Duration::from_secs(1));
        assert_eq!(config.notifications.app_name, "taskbell");
        assert_eq!(config.notifications.timeout(), Duration::from_secs(10));
        assert!(config.notifications.command.is_none());
        assert!(config.storage.tasks_file.is_none());
    }

    #[test]
    fn parse_full_config() {
        let f = write_config(
            r#"
[storage]
tasks_file = "/data/tasks.json"
completion_log = "/data/done.txt"

[reminders]
poll_interval_secs = 5
window_minutes = 30
shutdown_timeout_ms = 250

[notifications]
app_name = "TaskScheduler"
timeout_secs = 4
command = "dunstify"
"#,
        );
        let config = Config::load_from(f.path()).unwrap();
        assert_eq!(config.tasks_file(), PathBuf::from("/data/tasks.json"));
        assert_eq!(config.completion_log(), PathBuf::from("/data/done.txt"));
        assert_eq!(config.reminders.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.reminders.window(), TimeDelta::minutes(30));
        assert_eq!(config.reminders.shutdown_timeout(), Duration::from_millis(250));
        assert_eq!(config.notifications.app_name, "TaskScheduler");
        assert_eq!(config.notifications.command.as_deref(), Some("dunstify"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let f = write_config("[reminders]\nwindow_minutes = 10\n");
        let config = Config::load_from(f.path()).unwrap();
        assert_eq!(config.reminders.window_minutes, 10);
        assert_eq!(config.reminders.poll_interval_secs, 15);
    }

    #[test]
    fn unknown_keys_rejected() {
        let f = write_config("[reminders]\npoll = 3\n");
        let err = Config::load_from(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let f = write_config("[reminders]\npoll_interval_secs = 0\n");
        assert!(Config::load_from(f.path()).is_err());
    }

    #[test]
    fn oversized_intervals_rejected() {
        let f = write_config("[reminders]\npoll_interval_secs = 9223372036854775807\n");
        let err = Config::load_from(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("poll_interval_secs must be at most"));

        let f = write_config("[reminders]\nwindow_minutes = 9223372036854775807\n");
        let err = Config::load_from(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("window_minutes must be at most"));
    }
}
