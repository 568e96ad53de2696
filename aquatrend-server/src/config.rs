use crate::error::AppError;
use crate::pipeline::clock::ClockZone;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(skip)]
    pub config_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Fjall,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Owners whose sensors are sampled and whose current periods are
    /// refreshed in the background.
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Wall clock used to cut hours, days, weeks and months.
    #[serde(default)]
    pub clock: ClockZone,
    #[serde(default = "default_seed_on_start")]
    pub seed_on_start: bool,
}

fn default_sample_interval() -> u64 {
    300
}

fn default_refresh_interval() -> u64 {
    900
}

fn default_seed_on_start() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            owners: Vec::new(),
            sample_interval_secs: default_sample_interval(),
            refresh_interval_secs: default_refresh_interval(),
            clock: ClockZone::default(),
            seed_on_start: default_seed_on_start(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/aquatrend-server")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| AppError::Config(format!("invalid {name}: {e}")))
}

impl AppConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, AppError> {
        let path = config_path
            .or_else(|| {
                std::env::var("AQUATREND_CONFIG_PATH")
                    .ok()
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        if !path.exists() {
            return Err(AppError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path).map_err(AppError::Io)?;
        let mut config = Self::from_toml(&contents)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {e}", path.display())))?;

        config.config_path = path.clone();
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<AppConfig>(contents)
    }

    fn apply_env_overrides(&mut self) -> Result<(), AppError> {
        if let Ok(host) = std::env::var("AQUATREND_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("AQUATREND_SERVER_PORT") {
            self.server.port = parse_env("AQUATREND_SERVER_PORT", &port)?;
        }
        if let Ok(level) = std::env::var("AQUATREND_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Ok(format) = std::env::var("AQUATREND_LOG_FORMAT") {
            self.log.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(AppError::Config(format!(
                        "invalid AQUATREND_LOG_FORMAT '{other}', expected 'text' or 'json'"
                    )));
                }
            };
        }
        if let Ok(data_dir) = std::env::var("AQUATREND_STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }

        // Pipeline env var overrides
        if let Ok(owners) = std::env::var("AQUATREND_OWNERS") {
            self.pipeline.owners = owners
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(secs) = std::env::var("AQUATREND_SAMPLE_INTERVAL") {
            self.pipeline.sample_interval_secs = parse_env("AQUATREND_SAMPLE_INTERVAL", &secs)?;
        }
        if let Ok(secs) = std::env::var("AQUATREND_REFRESH_INTERVAL") {
            self.pipeline.refresh_interval_secs = parse_env("AQUATREND_REFRESH_INTERVAL", &secs)?;
        }
        if let Ok(clock) = std::env::var("AQUATREND_CLOCK") {
            self.pipeline.clock = parse_env("AQUATREND_CLOCK", &clock)?;
        }
        Ok(())
    }

    /// Reject settings that would make the background loops spin or
    /// produce unaddressable documents.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.pipeline.sample_interval_secs == 0 {
            return Err(AppError::Config(
                "pipeline.sample_interval_secs must be greater than zero".into(),
            ));
        }
        if self.pipeline.refresh_interval_secs == 0 {
            return Err(AppError::Config(
                "pipeline.refresh_interval_secs must be greater than zero".into(),
            ));
        }
        for owner in &self.pipeline.owners {
            crate::pipeline::paths::validate_owner(owner)
                .map_err(|e| AppError::Config(format!("pipeline.owners: {e}")))?;
        }
        Ok(())
    }
}
