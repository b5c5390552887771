//! beleg-config
//!
//! Persistent settings for the Beleg engine: folder roots, ledger location and the tuning
//! knobs of the watcher, allocator and recurring generator.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::{app_dir, ConfigManager, APP_HOME_ENV};
pub use model::Config;
