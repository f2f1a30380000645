//! VibeSwitch: rewrite text in the voice of a persona using a model that
//! runs on the local machine.
//!
//! The model file is downloaded on first use ([`models`]), loaded once into
//! a session ([`formatting::session`]) and released on shutdown. [`app`]
//! ties the two together behind the surface a UI needs.

pub mod app;
pub mod config;
pub mod error;
pub mod formatting;
pub mod models;

pub use app::{AppStatus, VibeSwitch};
pub use config::AppConfig;
pub use error::{ConfigError, InferenceError, InitError, LoadError, ProvisioningError, SubmitError};
