/// Runtime configuration from daisy_tools.toml
///
/// Every field has a default, so the file is optional. After loading, `.env`
/// is read and `DMI_API_KEY` / `DATABASE_URL` override the file.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::db;
use crate::dmi;
use crate::logging::LogLevel;
use crate::units::{MISSING_LAYER_THICKNESS_M, Unit};

pub const DEFAULT_CONFIG_FILE: &str = "daisy_tools.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hip: HipConfig,
    pub dmi: DmiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HipConfig {
    /// Unit of extracted elevations and heads.
    pub unit: String,
    /// Thickness HIP gives absent layers, in meters.
    pub missing_layer_thickness: f64,
}

impl Default for HipConfig {
    fn default() -> Self {
        Self {
            unit: "meter".to_string(),
            missing_layer_thickness: MISSING_LAYER_THICKNESS_M,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DmiConfig {
    pub api_key: Option<String>,
    pub api: String,
    pub version: String,
    pub time_resolution: String,
    pub parameters: Vec<String>,
}

impl Default for DmiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api: "climateData".to_string(),
            version: "v2".to_string(),
            time_resolution: dmi::DEFAULT_TIME_RESOLUTION.to_string(),
            parameters: dmi::DEFAULT_PARAMETERS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: db::DEFAULT_URL.to_string(),
            table: db::DEFAULT_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

impl Config {
    /// Load `path`, or `daisy_tools.toml` if present, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Config::default(),
        };

        dotenv::dotenv().ok();
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("DMI_API_KEY").filter(|k| !k.is_empty()) {
            self.dmi.api_key = Some(key);
        }
        if let Some(url) = var("DATABASE_URL").filter(|u| !u.is_empty()) {
            self.database.url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;
        self.unit()?;
        if !(self.hip.missing_layer_thickness.is_finite() && self.hip.missing_layer_thickness > 0.0) {
            return Err(ConfigError::Invalid {
                key: "hip.missing_layer_thickness",
                message: format!("{} is not a positive thickness", self.hip.missing_layer_thickness),
            });
        }
        self.dmi_api()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|message| ConfigError::Invalid { key: "logging.level", message })
    }

    pub fn unit(&self) -> Result<Unit, ConfigError> {
        Unit::parse(&self.hip.unit).map_err(|e| ConfigError::Invalid {
            key: "hip.unit",
            message: e.to_string(),
        })
    }

    /// Unit whose magnitude is the configured missing-layer thickness.
    pub fn missing_layer_unit(&self) -> Result<Unit, ConfigError> {
        Unit::parse(&format!("{} m", self.hip.missing_layer_thickness)).map_err(|e| ConfigError::Invalid {
            key: "hip.missing_layer_thickness",
            message: e.to_string(),
        })
    }

    pub fn dmi_api(&self) -> Result<dmi::DmiApi, ConfigError> {
        self.dmi.api.parse().map_err(|e: dmi::DmiError| ConfigError::Invalid {
            key: "dmi.api",
            message: e.to_string(),
        })
    }
}
