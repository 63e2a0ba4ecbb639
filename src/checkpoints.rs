//! Single-slot notebook checkpoints
//!
//! Checkpoints live in a shadow namespace next to each notebook:
//! `a/b.ipynb` is shadowed by `a/.ipynb_checkpoints/b-checkpoint.ipynb`.
//! Each notebook has exactly one slot with the fixed id "checkpoint";
//! creating again overwrites the previous snapshot. Deleting a notebook
//! does not remove its shadow object.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::contents::{Contents, ObjectContentsManager};
use crate::error::StoreError;
use crate::listing::{parse_last_modified, TimeFormat};
use crate::model::CheckpointModel;
use crate::notebook::NOTEBOOK_EXT;

/// Fixed id of the single checkpoint slot.
pub const CHECKPOINT_ID: &str = "checkpoint";

/// Shadow directory holding checkpoint objects.
pub const CHECKPOINT_DIR: &str = ".ipynb_checkpoints";

/// Checkpoint operation surface the host framework invokes.
pub trait Checkpoints: Send + Sync {
    /// Snapshot the current notebook content into the shadow slot,
    /// overwriting any previous snapshot.
    fn create_checkpoint(&self, path: &str) -> Result<CheckpointModel, StoreError>;

    /// Write the snapshot back over the live notebook, unconditionally.
    fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> Result<(), StoreError>;

    /// Zero or one descriptor, never more.
    fn list_checkpoints(&self, path: &str) -> Result<Vec<CheckpointModel>, StoreError>;

    /// Descriptor only; checkpoint content is never returned here.
    fn get_checkpoint_model(
        &self,
        checkpoint_id: &str,
        path: &str,
    ) -> Result<CheckpointModel, StoreError>;

    /// Remove the shadow object.
    fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> Result<(), StoreError>;
}

/// Checkpoint manager reusing the contents manager's raw read/write
/// primitives.
pub struct CheckpointManager {
    contents: Arc<ObjectContentsManager>,
}

impl CheckpointManager {
    pub fn new(contents: Arc<ObjectContentsManager>) -> Self {
        Self { contents }
    }

    /// Shadow path for a notebook path.
    fn checkpoint_path(&self, path: &str) -> String {
        let delimiter = self.contents.delimiter();
        let (parent, name) = match path.rsplit_once(delimiter) {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };
        let stem = name.strip_suffix(NOTEBOOK_EXT).unwrap_or(name);
        let checkpoint_name = format!("{}-{}{}", stem, CHECKPOINT_ID, NOTEBOOK_EXT);
        if parent.is_empty() {
            format!("{}{}{}", CHECKPOINT_DIR, delimiter, checkpoint_name)
        } else {
            format!(
                "{}{}{}{}{}",
                parent, delimiter, CHECKPOINT_DIR, delimiter, checkpoint_name
            )
        }
    }

    fn require_id(checkpoint_id: &str) -> Result<(), StoreError> {
        if checkpoint_id != CHECKPOINT_ID {
            return Err(StoreError::NotFound(format!("checkpoint {}", checkpoint_id)));
        }
        Ok(())
    }

    fn descriptor(&self, shadow_path: &str) -> Result<Option<CheckpointModel>, StoreError> {
        match self.contents.object_entry(shadow_path)? {
            Some(entry) => {
                let raw = entry.last_modified.as_deref().ok_or_else(|| {
                    StoreError::TimestampParse {
                        raw: String::new(),
                        reason: format!("no last-modified reported for {}", shadow_path),
                    }
                })?;
                let last_modified = parse_last_modified(raw, TimeFormat::ObjectGet)?;
                Ok(Some(CheckpointModel {
                    id: CHECKPOINT_ID.to_string(),
                    last_modified,
                }))
            }
            None => Ok(None),
        }
    }
}

impl Checkpoints for CheckpointManager {
    fn create_checkpoint(&self, path: &str) -> Result<CheckpointModel, StoreError> {
        let shadow = self.checkpoint_path(path);
        info!("checkpointing {} -> {}", path, shadow);
        let bytes = self.contents.fetch_bytes(path)?;
        self.contents.put_bytes(&shadow, &bytes)?;
        match self.descriptor(&shadow)? {
            Some(model) => Ok(model),
            None => {
                // an eventually-consistent store may not surface the
                // write immediately
                warn!("shadow object {} not yet visible, synthesizing timestamp", shadow);
                Ok(CheckpointModel {
                    id: CHECKPOINT_ID.to_string(),
                    last_modified: Utc::now(),
                })
            }
        }
    }

    fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> Result<(), StoreError> {
        Self::require_id(checkpoint_id)?;
        let shadow = self.checkpoint_path(path);
        info!("restoring {} from {}", path, shadow);
        let bytes = self.contents.fetch_bytes(&shadow)?;
        self.contents.put_bytes(path, &bytes)
    }

    fn list_checkpoints(&self, path: &str) -> Result<Vec<CheckpointModel>, StoreError> {
        let shadow = self.checkpoint_path(path);
        debug!("list_checkpoints: {} -> {}", path, shadow);
        Ok(self.descriptor(&shadow)?.into_iter().collect())
    }

    fn get_checkpoint_model(
        &self,
        checkpoint_id: &str,
        path: &str,
    ) -> Result<CheckpointModel, StoreError> {
        Self::require_id(checkpoint_id)?;
        let shadow = self.checkpoint_path(path);
        self.descriptor(&shadow)?
            .ok_or_else(|| StoreError::NotFound(format!("checkpoint for {}", path)))
    }

    fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> Result<(), StoreError> {
        Self::require_id(checkpoint_id)?;
        let shadow = self.checkpoint_path(path);
        if self.contents.object_entry(&shadow)?.is_none() {
            return Err(StoreError::NotFound(format!("checkpoint for {}", path)));
        }
        debug!("deleting checkpoint {}", shadow);
        self.contents.delete(&shadow)
    }
}
