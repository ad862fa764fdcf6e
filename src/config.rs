use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Event intake configuration
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Status store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileNotFound {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileNotFound {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a file (auto-detects format from extension)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        match extension {
            "toml" => Self::from_toml_file(path),
            "yaml" | "yml" => Self::from_yaml_file(path),
            _ => Err(ConfigError::Parse(format!(
                "unsupported file extension '{}'; use .toml, .yaml, or .yml",
                extension
            ))),
        }
    }

    /// Load configuration from environment variables.
    /// Prefix: SENSOR_RUNTIME_
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SENSOR_RUNTIME")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from multiple sources (defaults, then file,
    /// then env overrides)
    pub fn from_sources<P: AsRef<Path>>(file_path: Option<P>) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut settings = config::Config::builder().add_source(defaults);

        if let Some(path) = file_path {
            let path_str = path.as_ref().display().to_string();
            settings = settings.add_source(config::File::with_name(&path_str).required(false));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SENSOR_RUNTIME")
                .separator("__")
                .try_parsing(true),
        );

        settings
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.intake.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

/// Event intake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Capacity of the bounded queue between intake actors and the
    /// round actor. Producers block when it is full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

impl IntakeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "intake.queue_capacity".to_string(),
                message: "queue capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Status store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bound on compare-and-set retries before a write conflict is fatal
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,
}

fn default_write_retries() -> u32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { write_retries: 3 }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.write_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.write_retries".to_string(),
                message: "write retries must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output directory; empty disables file logging
    #[serde(default)]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: String::new(),
        }
    }
}
