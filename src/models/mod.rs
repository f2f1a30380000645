pub mod downloader;
pub mod registry;
pub mod types;

pub use downloader::ModelDownloader;
pub use registry::{ModelRegistry, DEFAULT_MODEL_ID};
pub use types::{ModelDescriptor, ProvisioningState};
