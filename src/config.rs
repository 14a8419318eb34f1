use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default = "default_lock_stale_after")]
    pub lock_stale_after: String,
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorsConfig {
    #[serde(default = "default_gpu_tool")]
    pub gpu_tool: String,
    #[serde(default = "default_temperature_group")]
    pub temperature_group: String,
    #[serde(default = "default_core_label_marker")]
    pub core_label_marker: String,
    #[serde(default = "default_cpu_sample")]
    pub cpu_sample: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
            log_filter: default_log_filter(),
            sensors: SensorsConfig::default(),
            lock_stale_after: default_lock_stale_after(),
            metrics_textfile: None,
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            gpu_tool: default_gpu_tool(),
            temperature_group: default_temperature_group(),
            core_label_marker: default_core_label_marker(),
            cpu_sample: default_cpu_sample(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "поле data_dir обязательно".to_string(),
            ));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "поле log_dir обязательно".to_string(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле log_filter не должно быть пустым".to_string(),
            ));
        }
        if self.lock_stale_after()?.is_zero() {
            return Err(ConfigError::Validation(
                "поле lock_stale_after должно быть > 0".to_string(),
            ));
        }

        validate_sensors(&self.sensors)?;

        Ok(())
    }

    pub fn lock_stale_after(&self) -> Result<Duration, ConfigError> {
        parse_duration("lock_stale_after", &self.lock_stale_after)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

impl SensorsConfig {
    pub fn cpu_sample(&self) -> Result<Duration, ConfigError> {
        parse_duration("sensors.cpu_sample", &self.cpu_sample)
    }
}

fn validate_sensors(cfg: &SensorsConfig) -> Result<(), ConfigError> {
    if cfg.gpu_tool.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sensors.gpu_tool не должен быть пустым".to_string(),
        ));
    }
    if cfg.temperature_group.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sensors.temperature_group не должен быть пустым".to_string(),
        ));
    }
    if cfg.core_label_marker.is_empty() {
        return Err(ConfigError::Validation(
            "sensors.core_label_marker не должен быть пустым".to_string(),
        ));
    }
    if cfg.cpu_sample()?.is_zero() {
        return Err(ConfigError::Validation(
            "sensors.cpu_sample должно быть > 0".to_string(),
        ));
    }
    Ok(())
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        ConfigError::Validation(format!(
            "{field}: некорректная длительность '{raw}': {err}"
        ))
    })
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./data/logs")
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_lock_stale_after() -> String {
    "5m".to_string()
}

fn default_gpu_tool() -> String {
    "nvidia-smi".to_string()
}

fn default_temperature_group() -> String {
    "coretemp".to_string()
}

fn default_core_label_marker() -> String {
    "Core".to_string()
}

fn default_cpu_sample() -> String {
    "500ms".to_string()
}
