//! Configuration for object store backends

use std::env;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::storage::local_store::LocalObjectStore;
use crate::storage::mock_store::MockObjectStore;
use crate::storage::ObjectStore;

/// Available object store backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreBackend {
    Local,
    Mock,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Local
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localfs" | "fs" => Ok(StoreBackend::Local),
            "mock" => Ok(StoreBackend::Mock),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

/// Configuration for the object store backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend type
    pub backend: StoreBackend,
    /// Base directory for the local backend
    pub base_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            base_path: "./data/objects".to_string(),
        }
    }
}

impl StorageConfig {
    /// Read backend selection from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match env::var("NBSTORE_BACKEND") {
            Ok(raw) => match raw.parse::<StoreBackend>() {
                Ok(backend) => {
                    info!("Using store backend from environment: {:?}", backend);
                    config.backend = backend;
                }
                Err(e) => {
                    warn!("Invalid store backend in environment: {}. Using default.", e);
                }
            },
            Err(_) => {
                info!("No store backend specified in environment, using default");
            }
        }
        if let Ok(base_path) = env::var("NBSTORE_BASE_PATH") {
            config.base_path = base_path;
        }
        config
    }

    /// Create a store instance based on the configuration.
    pub fn create_store(&self) -> Result<Arc<dyn ObjectStore>, StoreError> {
        match self.backend {
            StoreBackend::Local => Ok(Arc::new(LocalObjectStore::new(&self.base_path)?)),
            StoreBackend::Mock => Ok(Arc::new(MockObjectStore::new())),
        }
    }
}
