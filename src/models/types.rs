use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a model comes from and where it lives once downloaded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,
    pub download_url: String,
    pub file_name: String,
    pub directory: PathBuf,
    /// SHA-256 of the artifact, lowercase hex. Checked after a fresh download only.
    #[serde(default)]
    pub checksum: Option<String>,
}

impl ModelDescriptor {
    pub fn local_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvisioningState {
    #[default]
    NotChecked,
    Checking,
    Downloading { progress: u8 },
    Present,
    Failed { reason: String },
}

impl ProvisioningState {
    pub fn progress(&self) -> u8 {
        match self {
            ProvisioningState::Downloading { progress } => *progress,
            ProvisioningState::Present => 100,
            _ => 0,
        }
    }
}

/// Whole-percent progress, 0 while the total size is unknown.
pub fn percent_complete(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (written as f64 / total as f64) * 100.0;
    pct.floor().clamp(0.0, 100.0) as u8
}
