//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vibeswitch::formatting::{ChatMessage, Completion, GenerationParams, InferenceBackend, SessionOptions};
use vibeswitch::models::ModelDescriptor;

pub fn descriptor(url: &str, directory: &Path) -> ModelDescriptor {
    ModelDescriptor {
        id: "test-model".to_string(),
        download_url: url.to_string(),
        file_name: "test-model.gguf".to_string(),
        directory: directory.to_path_buf(),
        checksum: None,
    }
}

pub fn part_file(descriptor: &ModelDescriptor) -> PathBuf {
    let mut name = descriptor.local_path().into_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[derive(Debug)]
pub struct FakeHandle {
    pub id: usize,
}

/// Scripted stand-in for a local inference engine.
pub struct FakeBackend {
    pub response: Mutex<Result<Option<String>, String>>,
    pub load_error: Option<String>,
    pub release_error: Option<String>,
    pub delay: Duration,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    pub params: Mutex<Vec<GenerationParams>>,
    pub loaded: Mutex<Vec<(PathBuf, SessionOptions)>>,
    pub loads: AtomicUsize,
    pub releases: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            response: Mutex::new(Ok(Some("ok".to_string()))),
            load_error: None,
            release_error: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
            loaded: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            response: Mutex::new(Ok(Some(text.to_string()))),
            ..Self::default()
        }
    }

    pub fn set_response(&self, response: Result<Option<String>, String>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceBackend for FakeBackend {
    type Handle = FakeHandle;

    async fn load(&self, model_path: &Path, options: &SessionOptions) -> anyhow::Result<FakeHandle> {
        if let Some(reason) = &self.load_error {
            anyhow::bail!("{}", reason);
        }
        let id = self.loads.fetch_add(1, Ordering::SeqCst);
        self.loaded
            .lock()
            .unwrap()
            .push((model_path.to_path_buf(), options.clone()));
        Ok(FakeHandle { id })
    }

    async fn complete(
        &self,
        _handle: &FakeHandle,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> anyhow::Result<Completion> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.requests.lock().unwrap().push(messages.to_vec());
        self.params.lock().unwrap().push(params.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let response = self.response.lock().unwrap().clone();
        match response {
            Ok(text) => Ok(Completion { text }),
            Err(reason) => Err(anyhow::anyhow!(reason)),
        }
    }

    async fn release(&self, _handle: FakeHandle) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        match &self.release_error {
            Some(reason) => Err(anyhow::anyhow!(reason.clone())),
            None => Ok(()),
        }
    }
}
