//! Configuration module for the Zamzami ordering assistant.
//!
//! Provides `AppConfig` (runtime settings: Live API endpoint, audio rates,
//! window), `AppPaths` for cross-platform data directories, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.
//!
//! Business data (welcome message, prompt, orders) is not configuration; it
//! lives in [`crate::store`].

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, LiveConfig, UiConfig};
