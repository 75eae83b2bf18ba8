use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::AirqError;
use crate::worker::AdmissionPolicy;

pub const DEFAULT_BASE_URL: &str = "http://api.gios.gov.pl";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CONFIG_FILE: &str = "airq.json";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub admission: Option<AdmissionPolicy>,
}

impl Config {
    /// Fields set in `other` win.
    pub fn overlay(self, other: Config) -> Config {
        Config {
            base_url: other.base_url.or(self.base_url),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            data_dir: other.data_dir.or(self.data_dir),
            admission: other.admission.or(self.admission),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub timeout: Duration,
    pub data_dir: Utf8PathBuf,
    pub admission: AdmissionPolicy,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&str>) -> Result<Config, AirqError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Utf8Path) -> Result<Config, AirqError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| AirqError::ConfigRead(path.to_owned()))?;
        serde_json::from_str(&content).map_err(|err| AirqError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<Settings, AirqError> {
        let base_url = config
            .base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AirqError::ConfigParse(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(AirqError::ConfigParse(
                "timeout_secs must be positive".to_string(),
            ));
        }

        let data_dir = match config.data_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_data_dir(),
        };

        Ok(Settings {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            data_dir,
            admission: config.admission.unwrap_or_default(),
        })
    }
}

pub fn default_data_dir() -> Utf8PathBuf {
    ProjectDirs::from("pl", "gios", "airq")
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_dir().join("database")).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("database"))
}
