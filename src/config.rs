//! Backend configuration
//!
//! Explicit configuration passed at construction time, supporting YAML
//! files with sensible defaults. The root URI is validated once, when
//! the contents manager is built; a bad scheme is fatal there.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::storage::config::StorageConfig;

/// Main configuration for the contents backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentsConfig {
    /// Root URI of the form `s3://bucket/optional/prefix/`
    pub base_uri: String,
    /// Delimiter imposing hierarchy on flat keys
    pub delimiter: String,
    /// Secret for notebook integrity signatures
    pub signature_key: String,
    /// Untitled-name template for new notebooks
    pub untitled_notebook: String,
    /// Untitled-name template for new files
    pub untitled_file: String,
    /// Untitled-name template for new directories
    pub untitled_directory: String,
    /// Object store backend selection
    pub storage: StorageConfig,
}

impl Default for ContentsConfig {
    fn default() -> Self {
        Self {
            base_uri: "s3://notebooks/".to_string(),
            delimiter: "/".to_string(),
            signature_key: String::new(),
            untitled_notebook: "Untitled".to_string(),
            untitled_file: "untitled".to_string(),
            untitled_directory: "Untitled Folder".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

impl ContentsConfig {
    /// Load configuration from a YAML file, using defaults when the
    /// file is missing.
    pub fn load(path: &str) -> Result<Self, StoreError> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| StoreError::Backend(format!("reading {}: {}", path, e)))?;
            let config = serde_yaml::from_str(&content)
                .map_err(|e| StoreError::BadRequest(format!("invalid config {}: {}", path, e)))?;
            info!("Loaded configuration from {}", path);
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Default configuration rooted at the given URI.
    pub fn with_base_uri(base_uri: &str) -> Self {
        Self {
            base_uri: base_uri.to_string(),
            ..Self::default()
        }
    }
}
