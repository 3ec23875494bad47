//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir):
//!   Windows: %APPDATA%\zamzami-assistant\
//!   macOS:   ~/Library/Application Support/zamzami-assistant/
//!   Linux:   ~/.config/zamzami-assistant/
//!
//! Invoices are rendered into the system temp directory, not here.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and the settings store.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml` (runtime configuration).
    pub settings_file: PathBuf,
    /// Full path to `zamzami_settings.json` (business settings + orders).
    pub store_file: PathBuf,
    /// Directory that receives rendered invoice documents.
    pub invoice_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "zamzami-assistant";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let store_file = config_dir.join("zamzami_settings.json");
        let invoice_dir = std::env::temp_dir().join(Self::APP_NAME);

        Self {
            config_dir,
            settings_file,
            store_file,
            invoice_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .store_file
            .file_name()
            .is_some_and(|n| n == "zamzami_settings.json"));
    }

    #[test]
    fn store_lives_next_to_settings() {
        let paths = AppPaths::new();
        assert_eq!(paths.store_file.parent(), paths.settings_file.parent());
    }
}
