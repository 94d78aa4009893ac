//! Settings objects for the sync engine, scheduler and token lifecycle
//! manager, loaded from environment variables via the `config` crate
//! (`spec.md` §6). No CLI bootstrap or `.env` file plumbing lives here —
//! that wiring belongs to a deployment-specific binary, out of scope per
//! `spec.md` §1.

pub mod duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

pub use duration::HumanDuration;

static PREFIX: &str = "xpost";

/// Settings consumed by `SyncEngine` (`spec.md` §4.5, §6).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub interval: HumanDuration,
    pub max_retries: u32,
    pub batch_size: u32,
    pub max_memos_per_run: u32,
    pub skip_private: bool,
    pub skip_older: HumanDuration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: HumanDuration::parse("15m").unwrap(),
            max_retries: 3,
            batch_size: 20,
            max_memos_per_run: 100,
            skip_private: true,
            skip_older: HumanDuration::parse("168h").unwrap(),
        }
    }
}

/// Settings consumed by `Scheduler` (`spec.md` §4.6, §6).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub auto_sync_enabled: bool,
    pub default_interval: HumanDuration,
    pub max_concurrent_tasks: usize,
    pub max_retries: u32,
    pub retry_delay: HumanDuration,
    pub queue_size: usize,
    pub task_timeout: HumanDuration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            auto_sync_enabled: true,
            default_interval: HumanDuration::parse("15m").unwrap(),
            max_concurrent_tasks: 3,
            max_retries: 3,
            retry_delay: HumanDuration::parse("5m").unwrap(),
            queue_size: 100,
            task_timeout: HumanDuration::parse("10m").unwrap(),
        }
    }
}

/// Settings consumed by `TokenLifecycleManager` (`spec.md` §4.7).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub check_interval: HumanDuration,
    pub refresh_threshold: HumanDuration,
    pub minimum_age: HumanDuration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            check_interval: HumanDuration::parse("1h").unwrap(),
            refresh_threshold: HumanDuration::parse("168h").unwrap(), // 7 days
            minimum_age: HumanDuration::parse("24h").unwrap(),
        }
    }
}

/// Top-level settings, statsd label included for the ambient metrics
/// client (`spec.md` §6).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub statsd_label: String,
    pub statsd_host: Option<String>,
    pub statsd_port: u16,
    pub human_logs: bool,

    pub sync: SyncSettings,
    pub scheduler: SchedulerSettings,
    pub token: TokenSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            statsd_label: "xpost".to_owned(),
            statsd_host: None,
            statsd_port: 8125,
            human_logs: true,
            sync: SyncSettings::default(),
            scheduler: SchedulerSettings::default(),
            token: TokenSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from environment variables prefixed `XPOST_`, with
    /// `__` as the nesting separator (`XPOST_SYNC__MAX_RETRIES=5` maps to
    /// `sync.max_retries`), falling back to the documented defaults for
    /// anything unset. Mirrors `syncserver_settings::Settings::with_env_and_config_file`
    /// minus the config-file merge, which belongs to CLI bootstrap.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_prefixed(PREFIX)
    }

    pub fn from_env_prefixed(prefix: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix(&prefix.to_uppercase())
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        // `#[serde(default)]` on every settings struct fills in anything the
        // environment didn't set, so an empty environment round-trips to
        // `Settings::default()`.
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_contracted_values() {
        let settings = Settings::default();
        assert_eq!(settings.sync.interval.as_duration().as_secs(), 15 * 60);
        assert_eq!(settings.sync.max_retries, 3);
        assert_eq!(settings.sync.batch_size, 20);
        assert_eq!(settings.sync.max_memos_per_run, 100);
        assert!(settings.sync.skip_private);
        assert_eq!(settings.sync.skip_older.as_duration().as_secs(), 168 * 3600);

        assert!(settings.scheduler.auto_sync_enabled);
        assert_eq!(settings.scheduler.default_interval.as_duration().as_secs(), 15 * 60);
        assert_eq!(settings.scheduler.max_concurrent_tasks, 3);
        assert_eq!(settings.scheduler.max_retries, 3);
        assert_eq!(settings.scheduler.retry_delay.as_duration().as_secs(), 5 * 60);
        assert_eq!(settings.scheduler.queue_size, 100);
        assert_eq!(settings.scheduler.task_timeout.as_duration().as_secs(), 10 * 60);
    }

    #[test]
    fn environment_overrides_take_precedence() {
        temp_env::with_vars(
            [
                ("XPOST_SYNC__MAX_RETRIES", Some("7")),
                ("XPOST_SCHEDULER__QUEUE_SIZE", Some("500")),
            ],
            || {
                let settings = Settings::from_env().expect("settings should load");
                assert_eq!(settings.sync.max_retries, 7);
                assert_eq!(settings.scheduler.queue_size, 500);
                // Unset values still fall back to their documented default.
                assert_eq!(settings.sync.batch_size, 20);
            },
        );
    }
}
