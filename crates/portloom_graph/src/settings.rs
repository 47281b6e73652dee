// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph settings stored as RON.

use crate::graph::GraphError;
use portloom_history::DEFAULT_UNDO_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Conventional settings file name
pub const SETTINGS_FILE_NAME: &str = "graph.ron";

/// Behavior of a [`NodeGraph`](crate::NodeGraph)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Format version
    pub format_version: u32,
    /// Refuse connections that would close a cycle
    pub acyclic: bool,
    /// Maximum undo steps kept (0 = unlimited)
    pub undo_limit: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            format_version: SETTINGS_FORMAT_VERSION,
            acyclic: true,
            undo_limit: DEFAULT_UNDO_LIMIT,
        }
    }
}

impl GraphSettings {
    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self, GraphError> {
        let settings: GraphSettings = ron::from_str(content)?;
        if settings.format_version > SETTINGS_FORMAT_VERSION {
            return Err(GraphError::UnsupportedFormat(settings.format_version));
        }
        Ok(settings)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, GraphError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::info!("Loaded graph settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::info!("Saved graph settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GraphSettings::default();
        assert_eq!(settings.format_version, SETTINGS_FORMAT_VERSION);
        assert!(settings.acyclic);
        assert_eq!(settings.undo_limit, DEFAULT_UNDO_LIMIT);
    }

    #[test]
    fn test_serialization() {
        let settings = GraphSettings {
            acyclic: false,
            undo_limit: 5,
            ..GraphSettings::default()
        };
        let ron_str = settings.to_ron().unwrap();
        let loaded = GraphSettings::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = GraphSettings::from_ron("(acyclic: false)").unwrap();
        assert!(!loaded.acyclic);
        assert_eq!(loaded.undo_limit, DEFAULT_UNDO_LIMIT);
    }

    #[test]
    fn test_future_version_rejected() {
        let err = GraphSettings::from_ron("(format_version: 99)").unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedFormat(99)));
    }
}
