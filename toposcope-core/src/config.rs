//! TOML configuration for workspace discovery.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "toposcope.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    workspace: Option<WorkspaceConfig>,
}

/// Workspace-level configuration from `toposcope.toml`.
///
/// When present it takes precedence over the `workspaces` field of the root
/// `package.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Glob patterns, relative to the workspace root, matching package directories.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Glob patterns removed from the matches of `packages`.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Path to the config file (for diagnostics).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl WorkspaceConfig {
    /// Loads `toposcope.toml` from `root`, returning `None` if the file does
    /// not exist or has no `[workspace]` table.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let file: ConfigFile = toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: config_path.display().to_string(),
        })?;

        Ok(file.workspace.map(|mut config| {
            config.config_path = Some(config_path);
            config
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(WorkspaceConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn reads_workspace_table() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[workspace]\npackages = [\"libs/*\"]\nignore = [\"libs/old\"]\n",
        )
        .unwrap();

        let config = WorkspaceConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.packages, vec!["libs/*"]);
        assert_eq!(config.ignore, vec!["libs/old"]);
        assert!(config.config_path.is_some());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[workspace\n").unwrap();

        let err = WorkspaceConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }
}
