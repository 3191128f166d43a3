//! Root folder and configuration file resolution
//!
//! Every CastLink job works out of a single root folder holding the shared
//! SQLite database and the pipeline TOML config. Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `CASTLINK_ROOT_FOLDER` environment variable
//! 3. `root_folder` key in the user/system config file
//! 4. OS-dependent compiled default (fallback)

use crate::Result;
use std::path::{Path, PathBuf};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CASTLINK_ROOT_FOLDER";

/// Resolves the root folder from CLI/env/config-file/default tiers
pub struct RootFolderResolver {
    cli_arg: Option<String>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<String>) -> Self {
        Self { cli_arg }
    }

    /// Resolve the root folder, never failing (falls back to OS default)
    pub fn resolve(&self) -> PathBuf {
        // Priority 1: command-line argument
        if let Some(path) = &self.cli_arg {
            tracing::debug!(path = %path, "Root folder from command line");
            return PathBuf::from(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                tracing::debug!(path = %path, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        // Priority 3: config file
        if let Some(config_path) = locate_config_file() {
            if let Ok(content) = std::fs::read_to_string(&config_path) {
                if let Ok(value) = toml::from_str::<toml::Value>(&content) {
                    if let Some(root) = value.get("root_folder").and_then(|v| v.as_str()) {
                        tracing::debug!(
                            path = %root,
                            config = %config_path.display(),
                            "Root folder from config file"
                        );
                        return PathBuf::from(root);
                    }
                }
            }
        }

        // Priority 4: OS default
        default_root_folder()
    }
}

/// Prepares a resolved root folder for use
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            tracing::info!(path = %self.root.display(), "Creating root folder");
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Path of the shared SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root.join("castlink.db")
    }

    /// Path of the pipeline TOML config inside the root folder
    pub fn pipeline_config_path(&self) -> PathBuf {
        self.root.join("castlink.toml")
    }
}

/// Locate the platform config file (`castlink/config.toml`), if any
fn locate_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("castlink").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/castlink/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("castlink"))
        .unwrap_or_else(|| PathBuf::from("./castlink_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let resolver = RootFolderResolver::new(Some("/tmp/castlink-test".to_string()));
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/castlink-test"));
    }

    #[test]
    fn initializer_paths_are_inside_root() {
        let init = RootFolderInitializer::new(PathBuf::from("/data/castlink"));
        assert_eq!(init.database_path(), PathBuf::from("/data/castlink/castlink.db"));
        assert_eq!(
            init.pipeline_config_path(),
            PathBuf::from("/data/castlink/castlink.toml")
        );
    }

    #[test]
    fn initializer_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("nested").join("root");
        let init = RootFolderInitializer::new(root.clone());
        init.ensure_directory_exists().unwrap();
        assert!(root.is_dir());
    }
}
