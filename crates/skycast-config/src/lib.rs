use serde::{Deserialize, Serialize};
use skycast_core::{GeoPoint, Thresholds, TRAILING_WINDOW_YEARS};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "SKYCAST_CONFIG";
pub const EARTHDATA_TOKEN_VAR: &str = "EARTHDATA_TOKEN";
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiveConfig {
    pub cmr_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub lookup_dir: Option<PathBuf>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdvisorConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisConfig {
    pub default_lat: Option<f64>,
    pub default_lon: Option<f64>,
    pub default_date: Option<String>,
    pub window_years: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: Option<ServerConfig>,
    pub archive: Option<ArchiveConfig>,
    pub advisor: Option<AdvisorConfig>,
    pub thresholds: Option<Thresholds>,
    pub analysis: Option<AnalysisConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl AppConfig {
    /// Load configuration from SKYCAST_CONFIG path (TOML) if present, with reasonable defaults
    ///
    /// Secrets missing from the file are taken from EARTHDATA_TOKEN and GEMINI_API_KEY.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
        let cfg = Self::load_from(&path)?;
        Ok(cfg.with_env_secrets(|key| std::env::var(key).ok()))
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            Self::parse(&s)?
        } else {
            AppConfig::default()
        };
        Ok(cfg)
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let cfg = toml::from_str::<AppConfig>(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fill unset secrets through `lookup`
    pub fn with_env_secrets<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let archive = self.archive.get_or_insert_with(ArchiveConfig::default);
        if archive.token.is_none() {
            archive.token = non_empty(EARTHDATA_TOKEN_VAR);
        }
        let advisor = self.advisor.get_or_insert_with(AdvisorConfig::default);
        if advisor.api_key.is_none() {
            advisor.api_key = non_empty(GEMINI_API_KEY_VAR);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let default = self.default_point();
        if !default.is_valid() {
            return Err(ConfigError::Invalid {
                key: "analysis.default_lat/default_lon",
                reason: format!("({}, {}) is not a valid coordinate", default.lat, default.lon),
            });
        }
        if self.window_years() < 1 {
            return Err(ConfigError::Invalid {
                key: "analysis.window_years",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get HTTP bind address (default 0.0.0.0:5000)
    pub fn http_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0:5000".to_string())
    }

    pub fn cmr_url(&self) -> String {
        self.archive
            .as_ref()
            .and_then(|a| a.cmr_url.clone())
            .unwrap_or_else(|| "https://cmr.earthdata.nasa.gov".to_string())
    }

    /// Cache directory for trailing-window retrievals (default ./data)
    pub fn data_dir(&self) -> PathBuf {
        self.archive
            .as_ref()
            .and_then(|a| a.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    /// Cache directory for single-date lookups (default ./previous)
    pub fn lookup_dir(&self) -> PathBuf {
        self.archive
            .as_ref()
            .and_then(|a| a.lookup_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./previous"))
    }

    pub fn earthdata_token(&self) -> Option<String> {
        self.archive.as_ref().and_then(|a| a.token.clone())
    }

    pub fn archive_timeout(&self) -> Duration {
        let secs = self.archive.as_ref().and_then(|a| a.timeout_secs).unwrap_or(120);
        Duration::from_secs(secs)
    }

    pub fn advisor_endpoint(&self) -> String {
        self.advisor
            .as_ref()
            .and_then(|a| a.endpoint.clone())
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string())
    }

    pub fn advisor_model(&self) -> String {
        self.advisor
            .as_ref()
            .and_then(|a| a.model.clone())
            .unwrap_or_else(|| "gemini-2.0-flash-exp".to_string())
    }

    /// `None` disables advice generation
    pub fn advisor_api_key(&self) -> Option<String> {
        self.advisor.as_ref().and_then(|a| a.api_key.clone())
    }

    pub fn advisor_temperature(&self) -> f64 {
        self.advisor.as_ref().and_then(|a| a.temperature).unwrap_or(0.8)
    }

    pub fn advisor_max_output_tokens(&self) -> u32 {
        self.advisor
            .as_ref()
            .and_then(|a| a.max_output_tokens)
            .unwrap_or(250)
    }

    pub fn advisor_timeout(&self) -> Duration {
        let secs = self.advisor.as_ref().and_then(|a| a.timeout_secs).unwrap_or(30);
        Duration::from_secs(secs)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds.unwrap_or_default()
    }

    /// Point used when a request omits lat/lon (default 39.9, 116.4)
    pub fn default_point(&self) -> GeoPoint {
        let analysis = self.analysis.as_ref();
        GeoPoint::new(
            analysis.and_then(|a| a.default_lat).unwrap_or(39.9),
            analysis.and_then(|a| a.default_lon).unwrap_or(116.4),
        )
    }

    /// Date used when a request omits it (default 2020-06-01)
    pub fn default_date(&self) -> String {
        self.analysis
            .as_ref()
            .and_then(|a| a.default_date.clone())
            .unwrap_or_else(|| "2020-06-01".to_string())
    }

    pub fn window_years(&self) -> i32 {
        self.analysis
            .as_ref()
            .and_then(|a| a.window_years)
            .unwrap_or(TRAILING_WINDOW_YEARS)
    }
}
