use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tripsheet_core::ingest::DEFAULT_EXPORT_BASE_URL;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Sheet tab ids (the `gid` of each tab in the spreadsheet)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabsConfig {
    pub itinerary: String,
    pub travel_info: String,
    pub auth: String,
    /// Shopping reloads are skipped when unset
    pub shopping: Option<String>,
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            itinerary: "0".to_string(),
            travel_info: "2053866883".to_string(),
            auth: "2".to_string(),
            shopping: None,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Spreadsheet id
    pub sheet_id: ConfigValue<Option<String>>,
    /// Base URL of the CSV export service
    pub export_base_url: ConfigValue<String>,
    /// Remote write endpoint for shopping items
    pub write_url: ConfigValue<Option<String>>,
    /// Name recorded on items this user creates or edits
    pub user: ConfigValue<String>,
    /// Directory holding the local cache
    pub data_dir: ConfigValue<PathBuf>,
    pub tabs: TabsConfig,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    sheet_id: Option<String>,
    export_base_url: Option<String>,
    write_url: Option<String>,
    user: Option<String>,
    data_dir: Option<PathBuf>,
    tabs: Option<TabsConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut sheet_id = ConfigValue::new(None, ConfigSource::Default);
        let mut export_base_url =
            ConfigValue::new(DEFAULT_EXPORT_BASE_URL.to_string(), ConfigSource::Default);
        let mut write_url = ConfigValue::new(None, ConfigSource::Default);
        let mut user = ConfigValue::new("user".to_string(), ConfigSource::Default);
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut tabs = TabsConfig::default();
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(id) = file_config.sheet_id {
                sheet_id = ConfigValue::new(Some(id), ConfigSource::File);
            }
            if let Some(url) = file_config.export_base_url {
                export_base_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(url) = file_config.write_url {
                write_url = ConfigValue::new(Some(url), ConfigSource::File);
            }
            if let Some(name) = file_config.user {
                user = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(file_tabs) = file_config.tabs {
                tabs = file_tabs;
            }
        }

        if let Ok(id) = std::env::var("TRIPSHEET_SHEET_ID") {
            sheet_id = ConfigValue::new(Some(id), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("TRIPSHEET_EXPORT_URL") {
            export_base_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("TRIPSHEET_WRITE_URL") {
            write_url = ConfigValue::new(Some(url), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("TRIPSHEET_USER") {
            user = ConfigValue::new(name, ConfigSource::Environment);
        }
        if let Ok(dir) = std::env::var("TRIPSHEET_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }

        Ok(Self {
            sheet_id,
            export_base_url,
            write_url,
            user,
            data_dir,
            tabs,
            config_file,
        })
    }

    /// The spreadsheet id, required by every command that loads a sheet.
    pub fn require_sheet_id(&self) -> Result<&str, ConfigError> {
        self.sheet_id
            .value
            .as_deref()
            .ok_or(ConfigError::Missing("sheet_id", "TRIPSHEET_SHEET_ID"))
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/tripsheet/
    /// - macOS: ~/Library/Application Support/tripsheet/
    /// - Windows: %APPDATA%/tripsheet/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tripsheet")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/tripsheet/
    /// - macOS: ~/Library/Application Support/tripsheet/
    /// - Windows: %APPDATA%/tripsheet/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tripsheet")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    /// A required key is unset: (key, environment variable)
    Missing(&'static str, &'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Missing(key, env) => {
                write!(f, "'{}' is not configured (set it in the config file or {})", key, env)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
