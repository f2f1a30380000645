//! What the screen talks to: readiness, download progress, the init error,
//! and one rewrite entry point.

use crate::config::AppConfig;
use crate::error::{InferenceError, InitError, SubmitError};
use crate::formatting::{persona, InferenceBackend, Persona, SessionManager, SessionOptions};
use crate::models::{ModelDescriptor, ModelDownloader};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AppStatus {
    pub ready: bool,
    pub progress: u8,
    pub error: Option<String>,
}

/// Checks a rewrite request without touching the model.
pub fn validate_request(text: &str, persona_key: &str) -> Result<&'static Persona, SubmitError> {
    if text.trim().is_empty() {
        return Err(SubmitError::EmptyInput);
    }
    persona::find(persona_key).ok_or_else(|| SubmitError::UnknownPersona(persona_key.to_string()))
}

pub struct VibeSwitch<B: InferenceBackend> {
    descriptor: ModelDescriptor,
    options: SessionOptions,
    downloader: ModelDownloader,
    sessions: SessionManager<B>,
    error: watch::Sender<Option<String>>,
}

impl<B: InferenceBackend> VibeSwitch<B> {
    pub fn new(
        descriptor: ModelDescriptor,
        options: SessionOptions,
        downloader: ModelDownloader,
        backend: B,
    ) -> Self {
        let (error, _) = watch::channel(None);
        Self {
            descriptor,
            options,
            downloader,
            sessions: SessionManager::new(backend),
            error,
        }
    }

    pub fn from_config(config: &AppConfig, backend: B) -> anyhow::Result<Self> {
        let descriptor = config.model_descriptor()?;
        let downloader = ModelDownloader::new(config.http_timeout())?;
        Ok(Self::new(
            descriptor,
            config.session.clone(),
            downloader,
            backend,
        ))
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn sessions(&self) -> &SessionManager<B> {
        &self.sessions
    }

    pub fn status(&self) -> AppStatus {
        AppStatus {
            ready: self.sessions.is_ready(),
            progress: self.downloader.state().progress(),
            error: self.error.borrow().clone(),
        }
    }

    /// Provisions the model and loads it. A failure is kept as the status
    /// error and the app stays not-ready; nothing is retried. Does nothing
    /// once the app is ready.
    pub async fn start<F>(&self, on_progress: F) -> Result<(), InitError>
    where
        F: FnMut(u8) + Send,
    {
        if self.sessions.is_ready() {
            debug!(model = %self.descriptor.id, "Already ready, skipping start");
            return Ok(());
        }

        match self.initialize(on_progress).await {
            Ok(()) => {
                self.error.send_replace(None);
                info!(model = %self.descriptor.id, "VibeSwitch ready");
                Ok(())
            }
            Err(e) => {
                error!(model = %self.descriptor.id, error = %e, "Initialization failed");
                self.error.send_replace(Some(format!("Init error: {}", e)));
                Err(e)
            }
        }
    }

    async fn initialize<F>(&self, on_progress: F) -> Result<(), InitError>
    where
        F: FnMut(u8) + Send,
    {
        let model_path = self
            .downloader
            .ensure_model_available(&self.descriptor, on_progress)
            .await?;
        self.sessions
            .create_session(&model_path, self.options.clone())
            .await?;
        Ok(())
    }

    /// Validates the request, then starts the app if needed and rewrites
    /// `text`. An invalid request never downloads or loads the model.
    pub async fn run<F>(
        &self,
        text: &str,
        persona_key: &str,
        on_progress: F,
    ) -> Result<String, SubmitError>
    where
        F: FnMut(u8) + Send,
    {
        validate_request(text, persona_key)?;
        self.start(on_progress)
            .await
            .map_err(|e| SubmitError::Init(format!("Init error: {}", e)))?;
        self.submit(text, persona_key).await
    }

    /// Rewrites `text` in the voice of the persona named by `persona_key`.
    pub async fn submit(&self, text: &str, persona_key: &str) -> Result<String, SubmitError> {
        let persona = validate_request(text, persona_key)?;

        if !self.sessions.is_ready() {
            return Err(SubmitError::NotReady);
        }

        match self.sessions.generate(persona.prompt, text).await {
            Ok(output) => Ok(output),
            Err(InferenceError::NotReady) => Err(SubmitError::NotReady),
            Err(e) => {
                error!(persona = persona.key, error = %e, "Translation failed");
                Err(SubmitError::Failed)
            }
        }
    }

    /// Releases the model session. Safe to call more than once.
    pub async fn close(&self) {
        self.sessions.release_session().await;
    }
}
