use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_ARTWORK_WORKERS: usize = 8;
const MAX_THUMB_RATIO: f64 = 4.0;
const MAX_FILTER_TIME_HOURS: u64 = 24 * 365;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCommand {
    SetRestrictedMode(bool),
    SetUsePowerHint(bool),
    SetFilterTime(u64),
    SetFilterBoot(bool),
    SetFilterRunning(bool),
    SetTopSortLockedApps(bool),
    SetLaunchStats(bool),

    /// Generic setter for arbitrary config paths using dot-separated keys.
    /// Example: key = "settings.thumbnail.ratio", value = 1.5
    Set {
        key: String,
        value: Value,
    },

    GetConfig,
    SaveConfig,
    ReloadConfig,
}

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap_or_default().join(".switcher") }
pub fn prefs_file() -> PathBuf { data_dir().join("prefs.toml") }
pub fn stats_file() -> PathBuf { data_dir().join("stats.ron") }
pub fn config_file() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".config").join("switcher").join("config.toml")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Set when the process lacks the privilege to remove host tasks. All
    /// destructive operations are refused up front.
    #[serde(default = "no")]
    pub restricted_mode: bool,
    /// Ask the host for a performance boost while the overlay opens.
    #[serde(default = "no")]
    pub use_power_hint: bool,
    /// Only list tasks active within this many hours. 0 disables the filter.
    #[serde(default)]
    pub filter_time_hours: u64,
    /// Only list tasks active since the host last booted.
    #[serde(default = "no")]
    pub filter_boot: bool,
    /// Only list tasks whose process is still running.
    #[serde(default = "no")]
    pub filter_running: bool,
    /// Move locked apps to the front of the list.
    #[serde(default = "no")]
    pub top_sort_locked_apps: bool,
    /// Reverse the host's most-recently-used ordering.
    #[serde(default = "no")]
    pub revert_recents: bool,
    /// Record launch statistics when switching to a task.
    #[serde(default = "no")]
    pub launch_stats: bool,
    /// Enable hot-reloading of the config file when it changes
    #[serde(default = "yes")]
    pub hot_reload: bool,
    /// Upper bound passed to the host task registry query.
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    #[serde(default = "default_icon_size_dp")]
    pub icon_size_dp: u32,
    #[serde(default)]
    pub thumbnail: ThumbnailSettings,
    #[serde(default)]
    pub icon_cache: IconCacheSettings,
    /// Number of background threads resolving icons and thumbnails.
    #[serde(default = "default_artwork_workers")]
    pub artwork_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            restricted_mode: false,
            use_power_hint: false,
            filter_time_hours: 0,
            filter_boot: false,
            filter_running: false,
            top_sort_locked_apps: false,
            revert_recents: false,
            launch_stats: false,
            hot_reload: true,
            max_tasks: default_max_tasks(),
            icon_size_dp: default_icon_size_dp(),
            thumbnail: ThumbnailSettings::default(),
            icon_cache: IconCacheSettings::default(),
            artwork_workers: default_artwork_workers(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ThumbnailSettings {
    #[serde(default = "default_thumb_width_dp")]
    pub width_dp: u32,
    #[serde(default = "default_thumb_height_dp")]
    pub height_dp: u32,
    /// Scale applied on top of the dp size (the "thumb size" preference).
    #[serde(default = "default_thumb_ratio")]
    pub ratio: f64,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            width_dp: default_thumb_width_dp(),
            height_dp: default_thumb_height_dp(),
            ratio: default_thumb_ratio(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct IconCacheSettings {
    #[serde(default = "default_icon_cache_entries")]
    pub max_entries: usize,
    /// Total decoded pixels kept across all cached icons.
    #[serde(default = "default_icon_cache_pixels")]
    pub max_pixels: usize,
}

impl Default for IconCacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_icon_cache_entries(),
            max_pixels: default_icon_cache_pixels(),
        }
    }
}

fn yes() -> bool { true }
fn no() -> bool { false }
fn default_max_tasks() -> usize { 64 }
fn default_icon_size_dp() -> u32 { 52 }
fn default_thumb_width_dp() -> u32 { 160 }
fn default_thumb_height_dp() -> u32 { 240 }
fn default_thumb_ratio() -> f64 { 1.0 }
fn default_icon_cache_entries() -> usize { 128 }
fn default_icon_cache_pixels() -> usize { 4 * 1024 * 1024 }
fn default_artwork_workers() -> usize { 2 }

impl Settings {
    /// The time-window filter, if enabled.
    pub fn filter_time(&self) -> Option<Duration> {
        if self.filter_time_hours == 0 {
            None
        } else {
            // Configured in hours, applied in milliseconds.
            Some(Duration::from_millis(self.filter_time_hours * 3600 * 1000))
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.filter_time_hours > MAX_FILTER_TIME_HOURS {
            issues.push(format!(
                "filter_time_hours should not exceed {}, got {}",
                MAX_FILTER_TIME_HOURS, self.filter_time_hours
            ));
        }

        if self.max_tasks == 0 {
            issues.push("max_tasks must be at least 1".to_string());
        }

        if self.icon_size_dp == 0 {
            issues.push("icon_size_dp must be positive".to_string());
        }

        if self.artwork_workers == 0 || self.artwork_workers > MAX_ARTWORK_WORKERS {
            issues.push(format!(
                "artwork_workers must be between 1 and {}, got {}",
                MAX_ARTWORK_WORKERS, self.artwork_workers
            ));
        }

        issues.extend(self.thumbnail.validate());
        issues.extend(self.icon_cache.validate());

        issues
    }
}

impl ThumbnailSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.width_dp == 0 || self.height_dp == 0 {
            issues.push(format!(
                "thumbnail size must be positive, got {}x{}",
                self.width_dp, self.height_dp
            ));
        }

        if !(self.ratio > 0.0 && self.ratio <= MAX_THUMB_RATIO) {
            issues.push(format!(
                "thumbnail ratio must be in (0, {}], got {}",
                MAX_THUMB_RATIO, self.ratio
            ));
        }

        issues
    }
}

impl IconCacheSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.max_entries == 0 {
            issues.push("icon_cache.max_entries must be at least 1".to_string());
        }
        if self.max_pixels == 0 {
            issues.push("icon_cache.max_pixels must be positive".to_string());
        }

        issues
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(buf)?;
        Ok(config)
    }

    /// Reads the config at `path`, or the defaults if the file does not exist.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    /// Save the current config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> { self.settings.validate() }
}
