//! Seam between the app and whatever actually runs the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Options used when bringing a model into memory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SessionOptions {
    /// Token context window.
    pub context_size: u32,
    pub use_mlock: bool,
    /// 0 disables GPU offload; a large value asks for every layer the backend can place.
    pub gpu_layers: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            context_size: 4096,
            use_mlock: true,
            gpu_layers: 99,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub ignore_eos: bool,
    pub stop: Vec<String>,
    pub temperature: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: Option<String>,
}

/// A local inference engine. Handles are opaque to everything above this trait.
///
/// Calling `complete` concurrently on one handle is not supported; callers
/// serialize access.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    type Handle: Send + Sync;

    async fn load(&self, model_path: &Path, options: &SessionOptions) -> anyhow::Result<Self::Handle>;

    async fn complete(
        &self,
        handle: &Self::Handle,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> anyhow::Result<Completion>;

    async fn release(&self, handle: Self::Handle) -> anyhow::Result<()>;
}
