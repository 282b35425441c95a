//! Configuration file handling.
//!
//! Settings live in `~/.regionload/config.ini`:
//!
//! ```ini
//! [source]
//! base_url = https://example.org/api/features
//! resolver_url = https://example.org/api/regions
//! partition = postcode4
//! page_size = 500
//!
//! [cache]
//! directory = ~/.regionload/cache
//! ttl_hours = 24
//!
//! [loader]
//! page_delay_ms = 50
//! key_delay_ms = 100
//! empty_keys_retry_ms = 1000
//! max_concurrent_keys = 1
//!
//! [writeback]
//! enabled = true
//! url = https://example.org/api/cache
//!
//! [logging]
//! directory = ~/.regionload/logs
//! ```
//!
//! Missing files and missing keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::region::{Partition, DEFAULT_PAGE_SIZE};
use crate::session::{
    LoaderConfig, DEFAULT_EMPTY_KEYS_RETRY_DELAY, DEFAULT_KEY_DELAY, DEFAULT_PAGE_DELAY,
};

/// Name of the configuration directory under the home directory.
const CONFIG_DIR_NAME: &str = ".regionload";

/// Default partition name.
pub const DEFAULT_PARTITION: &str = "postcode4";

/// Default cache TTL in hours.
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 24;

const SECONDS_PER_HOUR: u64 = 3600;

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid INI.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value could not be converted to its expected type.
    #[error("invalid value for {section}.{key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Root of the paginated feature endpoint.
    pub base_url: Option<String>,
    /// Root of the parent → key resolver endpoint.
    pub resolver_url: Option<String>,
    /// Partition name.
    pub partition: String,
    /// Features per page.
    pub page_size: usize,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Disk cache directory.
    pub directory: PathBuf,
    /// Entry time-to-live in hours.
    pub ttl_hours: u64,
}

/// `[loader]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub page_delay_ms: u64,
    pub key_delay_ms: u64,
    pub empty_keys_retry_ms: u64,
    pub max_concurrent_keys: usize,
}

/// `[writeback]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritebackSettings {
    /// Submit completed merges to the server cache.
    pub enabled: bool,
    /// Root of the server cache endpoint.
    pub url: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for rolling log files.
    pub directory: PathBuf,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub cache: CacheSettings,
    pub loader: LoaderSettings,
    pub writeback: WritebackSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let dir = config_directory();
        Self {
            source: SourceSettings {
                base_url: None,
                resolver_url: None,
                partition: DEFAULT_PARTITION.to_string(),
                page_size: DEFAULT_PAGE_SIZE,
            },
            cache: CacheSettings {
                directory: dir.join("cache"),
                ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            },
            loader: LoaderSettings {
                page_delay_ms: DEFAULT_PAGE_DELAY.as_millis() as u64,
                key_delay_ms: DEFAULT_KEY_DELAY.as_millis() as u64,
                empty_keys_retry_ms: DEFAULT_EMPTY_KEYS_RETRY_DELAY.as_millis() as u64,
                max_concurrent_keys: 1,
            },
            writeback: WritebackSettings {
                enabled: true,
                url: None,
            },
            logging: LoggingSettings {
                directory: dir.join("logs"),
            },
        }
    }
}

impl ConfigFile {
    /// Load from the default location, or defaults if the file is missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, or defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse INI text on top of the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("source")) {
            if let Some(v) = non_empty(section.get("base_url")) {
                config.source.base_url = Some(v.to_string());
            }
            if let Some(v) = non_empty(section.get("resolver_url")) {
                config.source.resolver_url = Some(v.to_string());
            }
            if let Some(v) = non_empty(section.get("partition")) {
                config.source.partition = v.to_string();
            }
            if let Some(v) = non_empty(section.get("page_size")) {
                config.source.page_size = parse_value("source", "page_size", v)?;
            }
        }

        if let Some(section) = ini.section(Some("cache")) {
            if let Some(v) = non_empty(section.get("directory")) {
                config.cache.directory = expand_tilde(v);
            }
            if let Some(v) = non_empty(section.get("ttl_hours")) {
                let hours: u64 = parse_value("cache", "ttl_hours", v)?;
                if hours.checked_mul(SECONDS_PER_HOUR).is_none() {
                    return Err(invalid("cache", "ttl_hours", v));
                }
                config.cache.ttl_hours = hours;
            }
        }

        if let Some(section) = ini.section(Some("loader")) {
            if let Some(v) = non_empty(section.get("page_delay_ms")) {
                config.loader.page_delay_ms = parse_value("loader", "page_delay_ms", v)?;
            }
            if let Some(v) = non_empty(section.get("key_delay_ms")) {
                config.loader.key_delay_ms = parse_value("loader", "key_delay_ms", v)?;
            }
            if let Some(v) = non_empty(section.get("empty_keys_retry_ms")) {
                config.loader.empty_keys_retry_ms =
                    parse_value("loader", "empty_keys_retry_ms", v)?;
            }
            if let Some(v) = non_empty(section.get("max_concurrent_keys")) {
                config.loader.max_concurrent_keys =
                    parse_value("loader", "max_concurrent_keys", v)?;
            }
        }

        if let Some(section) = ini.section(Some("writeback")) {
            if let Some(v) = non_empty(section.get("enabled")) {
                config.writeback.enabled = parse_bool("writeback", "enabled", v)?;
            }
            if let Some(v) = non_empty(section.get("url")) {
                config.writeback.url = Some(v.to_string());
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = non_empty(section.get("directory")) {
                config.logging.directory = expand_tilde(v);
            }
        }

        Ok(config)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> Result<String, ConfigError> {
        let mut ini = Ini::new();
        ini.with_section(Some("source"))
            .set("base_url", self.source.base_url.clone().unwrap_or_default())
            .set(
                "resolver_url",
                self.source.resolver_url.clone().unwrap_or_default(),
            )
            .set("partition", self.source.partition.as_str())
            .set("page_size", self.source.page_size.to_string());
        ini.with_section(Some("cache"))
            .set("directory", self.cache.directory.to_string_lossy())
            .set("ttl_hours", self.cache.ttl_hours.to_string());
        ini.with_section(Some("loader"))
            .set("page_delay_ms", self.loader.page_delay_ms.to_string())
            .set("key_delay_ms", self.loader.key_delay_ms.to_string())
            .set(
                "empty_keys_retry_ms",
                self.loader.empty_keys_retry_ms.to_string(),
            )
            .set(
                "max_concurrent_keys",
                self.loader.max_concurrent_keys.to_string(),
            );
        ini.with_section(Some("writeback"))
            .set("enabled", self.writeback.enabled.to_string())
            .set("url", self.writeback.url.clone().unwrap_or_default());
        ini.with_section(Some("logging"))
            .set("directory", self.logging.directory.to_string_lossy());

        let mut buf = Vec::new();
        ini.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ini_string()?)?;
        Ok(())
    }

    /// Runtime loader configuration.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .with_delays(
                Duration::from_millis(self.loader.page_delay_ms),
                Duration::from_millis(self.loader.key_delay_ms),
            )
            .with_empty_keys_retry_delay(Duration::from_millis(self.loader.empty_keys_retry_ms))
            .with_cache_ttl(Duration::from_secs(
                self.cache.ttl_hours.saturating_mul(SECONDS_PER_HOUR),
            ))
            .with_max_concurrent_keys(self.loader.max_concurrent_keys)
    }

    /// Configured partition.
    pub fn partition(&self) -> Partition {
        Partition::new(self.source.partition.clone(), self.source.page_size)
    }
}

/// `~/.regionload`, or `./.regionload` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Human-readable byte size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(section, key, value))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value)),
    }
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.loader_config(), LoaderConfig::default());
        assert_eq!(config.partition(), Partition::new("postcode4", 500));
    }

    #[test]
    fn test_parse_overrides() {
        let config = ConfigFile::parse(
            "[source]\n\
             base_url = https://example.org/api\n\
             partition = district\n\
             page_size = 100\n\
             [cache]\n\
             directory = /tmp/regions\n\
             ttl_hours = 2\n\
             [loader]\n\
             page_delay_ms = 0\n\
             max_concurrent_keys = 4\n\
             [writeback]\n\
             enabled = no\n",
        )
        .unwrap();

        assert_eq!(config.source.base_url.as_deref(), Some("https://example.org/api"));
        assert_eq!(config.partition(), Partition::new("district", 100));
        assert_eq!(config.cache.directory, PathBuf::from("/tmp/regions"));
        assert!(!config.writeback.enabled);

        let loader = config.loader_config();
        assert_eq!(loader.page_delay, Duration::ZERO);
        assert_eq!(loader.key_delay, DEFAULT_KEY_DELAY);
        assert_eq!(loader.cache_ttl, Duration::from_secs(7200));
        assert_eq!(loader.max_concurrent_keys, 4);
    }

    #[test]
    fn test_invalid_number() {
        let err = ConfigFile::parse("[loader]\nkey_delay_ms = soon\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref section, ref key, .. }
                if section == "loader" && key == "key_delay_ms"
        ));
    }

    #[test]
    fn test_ttl_hours_overflowing_seconds_is_rejected() {
        let err = ConfigFile::parse("[cache]\nttl_hours = 18446744073709551615\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref section, ref key, .. }
                if section == "cache" && key == "ttl_hours"
        ));
    }

    #[test]
    fn test_huge_ttl_set_directly_saturates() {
        let mut config = ConfigFile::default();
        config.cache.ttl_hours = u64::MAX;
        assert_eq!(config.loader_config().cache_ttl, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_invalid_bool() {
        let err = ConfigFile::parse("[writeback]\nenabled = maybe\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.source.base_url = Some("https://example.org/api".to_string());
        config.loader.max_concurrent_keys = 3;
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
