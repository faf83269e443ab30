pub mod persistence;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use crate::core::session::SessionConfig;
use crate::core::transcript::DEFAULT_FAILURE_NOTICE;
use crate::core::types::{ExchangeOptions, PromptKey};
use crate::remote::http::HttpConfig;
use crate::stream::framing::{DEFAULT_EVENT_MARKER, FramingKind};

pub use persistence::{ConfigError, ConfigPatch, ConfigPersister, ConfigResult};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5050/generate";

pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|h| h.join("Library/Application Support/scholar"))
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .map(|c| c.join("scholar"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .map(|a| a.join("scholar"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|h| h.join(".config/scholar"))
    }
}

/// Every key is optional; unset keys fall back to the defaults exposed by the
/// accessor methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_key: Option<PromptKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frameworks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_analysis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl AppConfig {
    #[must_use]
    pub fn load() -> Self {
        let path = Self::get_config_path();
        Self::load_from(path.as_deref()).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {e}");
            Self::default()
        })
    }

    /// Layers an optional TOML file under `SCHOLAR_*` environment variables.
    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHOLAR")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("frameworks"),
        );

        builder.build().and_then(Config::try_deserialize)
    }

    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        get_config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn init_default() -> Result<PathBuf, io::Error> {
        let path = Self::get_config_path().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine config directory",
            )
        })?;
        Self::init_at(&path)?;
        Ok(path)
    }

    pub fn init_at(path: &Path) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("Config file already exists at {}", path.display()),
            ));
        }

        fs::write(path, include_str!("config.template.toml"))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    #[must_use]
    pub fn framing(&self) -> FramingKind {
        self.framing.unwrap_or_default()
    }

    #[must_use]
    pub fn prompt_key(&self) -> PromptKey {
        self.prompt_key.unwrap_or_default()
    }

    #[must_use]
    pub fn event_marker(&self) -> &str {
        self.event_marker.as_deref().unwrap_or(DEFAULT_EVENT_MARKER)
    }

    #[must_use]
    pub fn failure_notice(&self) -> &str {
        self.failure_notice
            .as_deref()
            .unwrap_or(DEFAULT_FAILURE_NOTICE)
    }

    #[must_use]
    pub fn http_config(&self) -> HttpConfig {
        let mut http = HttpConfig::new();
        if let Some(secs) = self.connect_timeout_secs {
            http = http.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_retries {
            http = http.with_max_retries(retries);
        }
        http
    }

    #[must_use]
    pub fn exchange_options(&self) -> ExchangeOptions {
        let mut options = ExchangeOptions::new();
        if let Some(deep) = self.deep_analysis {
            options = options.with_deep_analysis(deep);
        }
        if let Some(frameworks) = &self.frameworks {
            options = options.with_frameworks(frameworks.iter().cloned());
        }
        options
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            framing: self.framing(),
            event_marker: self.event_marker().to_string(),
            failure_notice: self.failure_notice().to_string(),
        }
    }
}
