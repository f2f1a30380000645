use super::types::ModelDescriptor;
use crate::error::{ConfigError, ProvisioningError};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_MODEL_ID: &str = "phi-3-mini-4k-instruct-q4";

/// Where models are stored when the config doesn't say otherwise.
pub fn default_models_dir() -> Result<PathBuf, ConfigError> {
    let project_dirs =
        ProjectDirs::from("com", "vibeswitch", "VibeSwitch").ok_or(ConfigError::NoProjectDirs)?;
    Ok(project_dirs.data_dir().join("models"))
}

/// Hardcoded catalog of models the app knows how to fetch.
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        let models_dir = models_dir.into();
        let mut models = HashMap::new();

        models.insert(
            DEFAULT_MODEL_ID.to_string(),
            ModelDescriptor {
                id: DEFAULT_MODEL_ID.to_string(),
                download_url: "https://huggingface.co/microsoft/Phi-3-mini-4k-instruct-gguf/resolve/main/Phi-3-mini-4k-instruct-q4.gguf".to_string(),
                file_name: "Phi-3-mini-4k-instruct-q4.gguf".to_string(),
                directory: models_dir,
                checksum: None,
            },
        );

        Self { models }
    }

    pub fn list_models(&self) -> Vec<ModelDescriptor> {
        let mut models: Vec<_> = self.models.values().cloned().collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    pub fn get_model(&self, id: &str) -> Result<ModelDescriptor, ProvisioningError> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| ProvisioningError::UnknownModel(id.to_string()))
    }

}
