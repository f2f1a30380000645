//! Error types for provisioning, loading and running the local model

use thiserror::Error;

/// Failure to get the model artifact onto local storage
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Download failed with HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Model download failed: {0}")]
    Transport(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Model not found: {0}")]
    UnknownModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ProvisioningError {
    fn from(err: reqwest::Error) -> Self {
        ProvisioningError::Transport(err.to_string())
    }
}

/// Failure to bring a model into memory
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("A session is already loaded; release it before loading another model")]
    AlreadyLoaded,

    #[error("Failed to load model: {0}")]
    Backend(String),
}

/// Failure of a single generation request
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("No model session is loaded")]
    NotReady,

    #[error("Completion failed: {0}")]
    Backend(String),
}

/// Problems reading the application config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to get project directories")]
    NoProjectDirs,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Why the model never became ready.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Rejections of a rewrite request. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Please enter some text to translate.")]
    EmptyInput,

    #[error("The model is not ready yet. Please wait for it to finish loading.")]
    NotReady,

    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    #[error("An error occurred during VibeSwitch translation. Try again.")]
    Failed,

    /// The model never became ready; carries the `Init error: ...` status text.
    #[error("{0}")]
    Init(String),
}
