// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner configuration stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Settings of the graph runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Configuration format version
    pub version: u32,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
    /// Frames to run when the command line does not say
    pub frames: u32,
    /// Register the built-in node classes
    pub register_builtin_nodes: bool,
    /// Header written to saved graphs that had none
    pub content_type: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            log_filter: "info,ordoplay_graph=debug".to_string(),
            frames: 1,
            register_builtin_nodes: true,
            content_type: "pipeline".to_string(),
        }
    }
}

impl GraphConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Parse configuration text
    pub fn from_ron(content: &str) -> std::io::Result<Self> {
        let config: GraphConfig = ron::from_str(content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Config version {} is newer than supported version {}",
                    config.version, CONFIG_FORMAT_VERSION
                ),
            ));
        }

        Ok(config)
    }

    /// Configuration as pretty RON text
    pub fn to_ron(&self) -> std::io::Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        ron::ser::to_string_pretty(self, config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save the configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_ron()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization() {
        let config = GraphConfig {
            frames: 3,
            log_filter: "warn".to_string(),
            ..GraphConfig::default()
        };
        let text = config.to_ron().unwrap();
        assert!(text.contains("GraphConfig"));
        assert_eq!(GraphConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = GraphConfig::from_ron("(frames: 5)").unwrap();
        assert_eq!(config.frames, 5);
        assert!(config.register_builtin_nodes);
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
    }

    #[test]
    fn test_newer_version_rejected() {
        let error = GraphConfig::from_ron("(version: 99)").unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::InvalidData);
        assert!(error.to_string().contains("newer"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "ordoplay_graph_config_{}.ron",
            std::process::id()
        ));
        let config = GraphConfig {
            content_type: "script".to_string(),
            ..GraphConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = GraphConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
