use crate::config::{AppConfig, get_config_dir};
use crate::core::types::PromptKey;
use crate::stream::framing::FramingKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config directory not found")]
    NoConfigDir,
}

/// Keys `scholar config set` may change. Unset fields leave the file alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub endpoint: Option<String>,
    pub framing: Option<FramingKind>,
    pub prompt_key: Option<PromptKey>,
}

impl ConfigPatch {
    #[must_use]
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.framing.is_none() && self.prompt_key.is_none()
    }
}

pub struct ConfigPersister {
    config_path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigPersister {
    #[must_use]
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_default_path() -> ConfigResult<Self> {
        get_config_dir()
            .map(|dir| Self::new(dir.join("config.toml")))
            .ok_or(ConfigError::NoConfigDir)
    }

    #[must_use]
    pub const fn path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn apply_patch(&self, patch: &ConfigPatch) -> ConfigResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let _lock = self.write_lock.lock();

        let existing = self.read_existing_config()?;

        let merged = Self::merge_config(existing, patch);

        self.atomic_write(&merged)
    }

    fn read_existing_config(&self) -> ConfigResult<AppConfig> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(AppConfig::default())
        }
    }

    fn merge_config(mut existing: AppConfig, patch: &ConfigPatch) -> AppConfig {
        if let Some(ref endpoint) = patch.endpoint {
            existing.endpoint = Some(endpoint.clone());
        }
        if let Some(framing) = patch.framing {
            existing.framing = Some(framing);
        }
        if let Some(prompt_key) = patch.prompt_key {
            existing.prompt_key = Some(prompt_key);
        }
        existing
    }

    fn atomic_write(&self, config: &AppConfig) -> ConfigResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_content = toml::to_string_pretty(config)?;
        let content = format!(
            "# Scholar Configuration\n\
             # Written by `scholar config set`.\n\n\
             {toml_content}"
        );

        let temp_path = self.config_path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}
