//! Configuration loading, validation, and broker-credential encryption for
//! the pipeline.

pub mod loader;
pub mod secrets;
pub mod settings;

pub use loader::{load_layered_yaml, LoadedConfig};
pub use secrets::{CredentialBundle, MasterKey};
pub use settings::Config;
