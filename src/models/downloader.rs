use super::types::{percent_complete, ModelDescriptor, ProvisioningState};
use crate::error::ProvisioningError;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Makes sure a model artifact is on local storage, fetching it on first use.
pub struct ModelDownloader {
    client: Client,
    state: watch::Sender<ProvisioningState>,
}

/// Forwards whole-percent progress to the caller and the state channel,
/// never going backwards and never repeating a value.
struct ProgressReporter<'a, F> {
    on_progress: &'a mut F,
    state: &'a watch::Sender<ProvisioningState>,
    last: Option<u8>,
}

impl<'a, F: FnMut(u8)> ProgressReporter<'a, F> {
    fn report(&mut self, progress: u8) {
        if self.last.map_or(true, |last| progress > last) {
            self.last = Some(progress);
            if progress < 100 {
                self.state
                    .send_replace(ProvisioningState::Downloading { progress });
            }
            (self.on_progress)(progress);
        }
    }
}

impl ModelDownloader {
    /// `timeout` of `None` leaves the transfer bounded only by the transport.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ProvisioningError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        let (state, _) = watch::channel(ProvisioningState::NotChecked);
        Self { client, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProvisioningState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ProvisioningState {
        self.state.borrow().clone()
    }

    /// Returns the local path of the model, downloading it if it isn't there yet.
    ///
    /// A file that already exists is accepted as-is. A failed download leaves
    /// nothing behind at the local path.
    pub async fn ensure_model_available<F>(
        &self,
        descriptor: &ModelDescriptor,
        mut on_progress: F,
    ) -> Result<PathBuf, ProvisioningError>
    where
        F: FnMut(u8) + Send,
    {
        self.state.send_replace(ProvisioningState::Checking);

        let mut reporter = ProgressReporter {
            on_progress: &mut on_progress,
            state: &self.state,
            last: None,
        };

        match self.provision(descriptor, &mut reporter).await {
            Ok(path) => {
                self.state.send_replace(ProvisioningState::Present);
                Ok(path)
            }
            Err(e) => {
                self.state.send_replace(ProvisioningState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn provision<F: FnMut(u8)>(
        &self,
        descriptor: &ModelDescriptor,
        reporter: &mut ProgressReporter<'_, F>,
    ) -> Result<PathBuf, ProvisioningError> {
        let model_path = descriptor.local_path();

        if is_file(&model_path).await {
            info!(model = %descriptor.id, path = %model_path.display(), "Model found locally, skipping download");
            reporter.report(100);
            return Ok(model_path);
        }

        info!(model = %descriptor.id, url = %descriptor.download_url, "Model not found locally, starting download");

        if let Some(parent) = model_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part_path = part_path_for(&model_path);
        let result = self
            .download_file(descriptor, &part_path, &model_path, reporter)
            .await;

        if let Err(e) = result {
            warn!(model = %descriptor.id, error = %e, "Model download failed, removing partial file");
            discard(&part_path).await;
            discard(&model_path).await;
            return Err(e);
        }

        reporter.report(100);
        info!(model = %descriptor.id, path = %model_path.display(), "Model download complete");
        Ok(model_path)
    }

    async fn download_file<F: FnMut(u8)>(
        &self,
        descriptor: &ModelDescriptor,
        part_path: &Path,
        model_path: &Path,
        reporter: &mut ProgressReporter<'_, F>,
    ) -> Result<(), ProvisioningError> {
        let response = self.client.get(&descriptor.download_url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProvisioningError::HttpStatus(status.as_u16()));
        }

        let total_size = response.content_length().unwrap_or(0);
        debug!(total_size, "Streaming model to {}", part_path.display());
        self.state
            .send_replace(ProvisioningState::Downloading { progress: 0 });

        let mut file = File::create(part_path).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            // 100 is held back until the file is in place
            reporter.report(percent_complete(downloaded, total_size).min(99));
        }

        file.flush().await?;
        drop(file);

        if let Some(expected) = descriptor.checksum.as_deref() {
            let actual = sha256_file(part_path).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ProvisioningError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
            debug!(model = %descriptor.id, "Checksum verified");
        }

        tokio::fs::rename(part_path, model_path).await?;
        Ok(())
    }

    /// Deletes the local artifact. Deleting a model that isn't there is fine.
    pub async fn remove_model(&self, descriptor: &ModelDescriptor) -> Result<(), ProvisioningError> {
        let model_path = descriptor.local_path();
        remove_if_exists(&model_path).await?;
        remove_if_exists(&part_path_for(&model_path)).await?;
        self.state.send_replace(ProvisioningState::NotChecked);
        info!(model = %descriptor.id, "Model removed");
        Ok(())
    }
}

fn part_path_for(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn is_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file())
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial download");
    }
}

pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        let path = part_path_for(Path::new("/models/phi.gguf"));
        assert_eq!(path, PathBuf::from("/models/phi.gguf.part"));
    }

    #[test]
    fn reporter_is_monotone_and_deduplicated() {
        let (state, _rx) = watch::channel(ProvisioningState::NotChecked);
        let mut seen = Vec::new();
        let mut push = |p: u8| seen.push(p);
        let mut reporter = ProgressReporter {
            on_progress: &mut push,
            state: &state,
            last: None,
        };
        for p in [0, 0, 10, 5, 10, 50, 99, 100, 100] {
            reporter.report(p);
        }
        assert_eq!(seen, vec![0, 10, 50, 99, 100]);
    }

    #[tokio::test]
    async fn remove_if_exists_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bin");
        assert!(remove_if_exists(&missing).await.is_ok());
    }

    #[tokio::test]
    async fn sha256_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();
        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
