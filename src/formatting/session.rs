//! Owns the one loaded model and runs rewrite requests against it.

use super::backend::{ChatMessage, GenerationParams, InferenceBackend, SessionOptions};
use crate::error::{InferenceError, LoadError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

pub const MAX_NEW_TOKENS: u32 = 2048;
pub const STOP_SEQUENCE: &str = "<|end|>";
pub const TEMPERATURE: f32 = 0.8;
pub const NO_RESULTS: &str = "No results";

const ASSISTANT_TAG: &str = "<|assistant|>";

#[derive(Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Releasing,
    Released,
    Failed { reason: String },
}

pub struct InferenceSession<H> {
    handle: H,
    model_path: PathBuf,
    options: SessionOptions,
}

pub struct SessionManager<B: InferenceBackend> {
    backend: B,
    // Held for the whole of a request, so requests on one handle never overlap.
    session: Mutex<Option<InferenceSession<B::Handle>>>,
    state: watch::Sender<SessionState>,
}

pub fn generation_params() -> GenerationParams {
    GenerationParams {
        max_tokens: MAX_NEW_TOKENS,
        ignore_eos: false,
        stop: vec![STOP_SEQUENCE.to_string()],
        temperature: TEMPERATURE,
    }
}

pub fn build_messages(system_prompt: &str, user_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!("Translate the following: {}", user_text)),
    ]
}

/// Trims the model output and drops stray assistant role tags. Removal
/// repeats until no tag is left, so a tag split around another one goes too.
pub fn clean_output(raw: Option<&str>) -> String {
    let mut cleaned = raw.unwrap_or_default().to_string();
    while cleaned.contains(ASSISTANT_TAG) {
        cleaned = cleaned.replace(ASSISTANT_TAG, "");
    }
    let cleaned = cleaned.trim().to_string();

    if cleaned.is_empty() {
        NO_RESULTS.to_string()
    } else {
        cleaned
    }
}

impl<B: InferenceBackend> SessionManager<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            backend,
            session: Mutex::new(None),
            state,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == SessionState::Ready
    }

    /// Loads the model at `model_path`. Only one session can be alive; swapping
    /// models means releasing first.
    pub async fn create_session(
        &self,
        model_path: &Path,
        options: SessionOptions,
    ) -> Result<(), LoadError> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }

        self.state.send_replace(SessionState::Loading);
        info!(path = %model_path.display(), ?options, "Loading model");

        match self.backend.load(model_path, &options).await {
            Ok(handle) => {
                *slot = Some(InferenceSession {
                    handle,
                    model_path: model_path.to_path_buf(),
                    options,
                });
                self.state.send_replace(SessionState::Ready);
                info!(path = %model_path.display(), "Model loaded");
                Ok(())
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(path = %model_path.display(), error = %reason, "Model load failed");
                self.state.send_replace(SessionState::Failed {
                    reason: reason.clone(),
                });
                Err(LoadError::Backend(reason))
            }
        }
    }

    /// Rewrites `user_text` following `system_prompt`. A failed request leaves
    /// the session usable.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, InferenceError> {
        let slot = self.session.lock().await;
        let session = slot.as_ref().ok_or(InferenceError::NotReady)?;

        let messages = build_messages(system_prompt, user_text);
        let params = generation_params();
        debug!(input_len = user_text.len(), "Submitting completion");

        let completion = self
            .backend
            .complete(&session.handle, &messages, &params)
            .await
            .map_err(|e| {
                let reason = format!("{:#}", e);
                warn!(error = %reason, "Completion failed");
                InferenceError::Backend(reason)
            })?;

        let text = clean_output(completion.text.as_deref());
        debug!(output_len = text.len(), "Completion finished");
        Ok(text)
    }

    /// Releases the loaded model. Never fails: release errors are only logged,
    /// and calling this with nothing loaded does nothing.
    pub async fn release_session(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            debug!("No model session to release");
            return;
        };

        self.state.send_replace(SessionState::Releasing);
        let path = session.model_path.clone();
        if let Err(e) = self.backend.release(session.handle).await {
            warn!(path = %path.display(), error = %format!("{:#}", e), "Cleanup failed");
        } else {
            info!(path = %path.display(), "Model released");
        }
        self.state.send_replace(SessionState::Released);
    }

    pub async fn session_options(&self) -> Option<SessionOptions> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.options.clone())
    }

    pub async fn model_path(&self) -> Option<PathBuf> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.model_path.clone())
    }
}
