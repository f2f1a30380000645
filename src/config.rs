use crate::error::ConfigError;
use crate::formatting::persona::DEFAULT_PERSONA_KEY;
use crate::formatting::SessionOptions;
use crate::models::registry::{default_models_dir, DEFAULT_MODEL_ID};
use crate::models::{ModelDescriptor, ModelRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub model_id: String,
    /// Overrides the catalog URL for `model_id`.
    pub download_url: Option<String>,
    pub models_dir: Option<PathBuf>,
    pub session: SessionOptions,
    pub llama_cli_path: Option<PathBuf>,
    pub default_persona: String,
    /// No timeout when unset.
    pub http_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            download_url: None,
            models_dir: None,
            session: SessionOptions::default(),
            llama_cli_path: None,
            default_persona: DEFAULT_PERSONA_KEY.to_string(),
            http_timeout_secs: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let project_dirs = directories::ProjectDirs::from("com", "vibeswitch", "VibeSwitch")
            .ok_or(ConfigError::NoProjectDirs)?;
        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Reads `path`, or returns the defaults if there is no file there.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn models_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.models_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_models_dir(),
        }
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    /// The descriptor of the configured model, with any URL override applied.
    pub fn model_descriptor(&self) -> anyhow::Result<ModelDescriptor> {
        let registry = ModelRegistry::new(self.models_dir()?);
        let mut descriptor = registry.get_model(&self.model_id)?;
        if let Some(url) = &self.download_url {
            descriptor.download_url = url.clone();
        }
        Ok(descriptor)
    }
}
