use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Complete hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sensors: SensorDefaults,
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

/// Transport binding
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1099
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Measurement log location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one record stream per sensor
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Appended to the sensor identity to form the file name
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from("./data")
}

fn default_file_suffix() -> String {
    "_measurements.txt".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            file_suffix: default_file_suffix(),
        }
    }
}

/// Simulated agent parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SensorDefaults {
    /// Interval used when an add request does not name one (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,
    /// Inclusive temperature range sampled by simulated agents
    #[serde(default = "default_temperature_range")]
    pub temperature_range: [i32; 2],
    /// Inclusive humidity range sampled by simulated agents
    #[serde(default = "default_humidity_range")]
    pub humidity_range: [i32; 2],
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_temperature_range() -> [i32; 2] {
    [20, 30]
}

fn default_humidity_range() -> [i32; 2] {
    [40, 60]
}

impl Default for SensorDefaults {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
            temperature_range: default_temperature_range(),
            humidity_range: default_humidity_range(),
        }
    }
}

/// Agent-to-hub channel sizing
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sensors: SensorDefaults::default(),
            ingestion: IngestionConfig::default(),
        }
    }
}

impl HubConfig {
    /// Apply `AGRIHUB_*` environment overrides on top of file/default values.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("AGRIHUB_BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Ok(v) = std::env::var("AGRIHUB_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("AGRIHUB_DATA_DIR") {
            self.storage.directory = PathBuf::from(v);
        }
        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<HubConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: HubConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load configuration from `path` if it exists, defaults otherwise, then env overrides.
pub fn load_or_default(path: &Path) -> Result<HubConfig> {
    let config = if path.exists() {
        load_config(path)?
    } else {
        HubConfig::default()
    };
    Ok(config.apply_env())
}
