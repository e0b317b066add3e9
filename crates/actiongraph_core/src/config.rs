// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library configuration files.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding extra library paths
pub const LIB_PATH_ENV: &str = "ACTIONGRAPH_LIB_PATH";

/// Per-path team file name
pub const TEAM_CONFIG_FILE: &str = "team_config.ron";

fn default_team() -> String {
    crate::actions::DEFAULT_TEAM.to_string()
}

/// Where the library looks for teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library root directories, one team each
    pub lib_paths: Vec<PathBuf>,
    /// Team searched first for unprefixed ids
    #[serde(default = "default_team")]
    pub default_team: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            lib_paths: Vec::new(),
            default_team: default_team(),
        }
    }
}

impl LibraryConfig {
    /// Load a RON config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = ron::from_str(&content)?;
        debug!(path = %path.display(), "Loaded library config");
        Ok(config)
    }

    /// Save as a RON config file
    pub fn save(&self, path: &Path) -> Result<()> {
        let pretty = ron::ser::PrettyConfig::default().struct_names(true);
        std::fs::write(path, ron::ser::to_string_pretty(self, pretty)?)?;
        Ok(())
    }

    /// Append the paths listed in [`LIB_PATH_ENV`], skipping duplicates
    pub fn with_env_paths(mut self) -> Self {
        if let Some(paths) = env::var_os(LIB_PATH_ENV) {
            for path in env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()) {
                if !self.lib_paths.contains(&path) {
                    self.lib_paths.push(path);
                }
            }
        }
        self
    }
}

/// Optional settings stored at the root of a library path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Team name, defaults to the directory name
    pub team_name: Option<String>,
}

impl TeamConfig {
    /// Read `team_config.ron` under `lib_path`, if present
    pub fn load(lib_path: &Path) -> Result<Self> {
        let path = lib_path.join(TEAM_CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Ok(ron::from_str(&std::fs::read_to_string(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = env::temp_dir().join(format!("actiongraph_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("library.ron");
        let config = LibraryConfig {
            lib_paths: vec![PathBuf::from("/opt/rigs")],
            default_team: "rig".into(),
        };
        config.save(&path).unwrap();
        assert_eq!(LibraryConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config() {
        let config: LibraryConfig = ron::from_str("(lib_paths: [\"a\"])").unwrap();
        assert_eq!(config.default_team, "default");
        let team: TeamConfig = ron::from_str("(team_name: Some(\"rig\"))").unwrap();
        assert_eq!(team.team_name.as_deref(), Some("rig"));
    }
}
