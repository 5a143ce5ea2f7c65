//! Device configuration loading

mod loader;

pub use loader::{load_config, ConfigLoadError};
