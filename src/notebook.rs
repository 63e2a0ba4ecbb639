//! Notebook document handling and trust signing
//!
//! A thin nbformat-v4 wrapper over raw JSON plus the integrity
//! signature used to track trusted cells. The signature lives in the
//! document's own metadata: a stateless backend has nowhere else to
//! persist trust across requests.

use log::debug;
use serde_json::{json, Value};

use crate::error::StoreError;

/// File extension marking a notebook document.
pub const NOTEBOOK_EXT: &str = ".ipynb";

/// The nbformat major version this backend reads and writes.
pub const NBFORMAT_VERSION: u64 = 4;

/// Metadata field carrying the integrity signature.
pub const SIGNATURE_KEY: &str = "signature";

/// An nbformat v4 document.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    value: Value,
}

impl Notebook {
    /// Wrap a JSON value, rejecting documents that are structurally not
    /// a notebook. Returns the reason on failure; callers wrap it into
    /// the error carrying the request path. Softer problems are left to
    /// `validate`.
    pub fn from_value(value: Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("notebook document must be a JSON object".to_string());
        }
        if !value.get("cells").map(Value::is_array).unwrap_or(false) {
            return Err("notebook document has no cells array".to_string());
        }
        if !value.get("nbformat").map(Value::is_u64).unwrap_or(false) {
            return Err("notebook document has no nbformat version".to_string());
        }
        Ok(Self { value })
    }

    /// Minimal valid document, used for untitled notebooks.
    pub fn empty() -> Self {
        Self {
            value: json!({
                "cells": [],
                "metadata": {},
                "nbformat": NBFORMAT_VERSION,
                "nbformat_minor": 5,
            }),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Serialize to UTF-8 text for upload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut bytes = serde_json::to_vec_pretty(&self.value)
            .map_err(|e| StoreError::Backend(format!("serializing notebook: {}", e)))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Schema check against the host's notebook expectations. Problems
    /// reported here are non-fatal; the caller attaches them to the
    /// returned model as a message.
    pub fn validate(&self) -> Option<String> {
        let mut problems = Vec::new();
        match self.value.get("nbformat").and_then(Value::as_u64) {
            Some(NBFORMAT_VERSION) => {}
            Some(other) => problems.push(format!("unsupported nbformat version {}", other)),
            None => problems.push("missing nbformat version".to_string()),
        }
        if self.value.get("nbformat_minor").and_then(Value::as_u64).is_none() {
            problems.push("missing nbformat_minor".to_string());
        }
        if !self.value.get("metadata").map(Value::is_object).unwrap_or(false) {
            problems.push("missing metadata object".to_string());
        }
        if let Some(cells) = self.value.get("cells").and_then(Value::as_array) {
            for (index, cell) in cells.iter().enumerate() {
                if cell.get("cell_type").and_then(Value::as_str).is_none() {
                    problems.push(format!("cell {} missing cell_type", index));
                }
                if cell.get("source").is_none() {
                    problems.push(format!("cell {} missing source", index));
                }
            }
        }
        if problems.is_empty() {
            None
        } else {
            let message = problems.join("; ");
            debug!("notebook validation: {}", message);
            Some(message)
        }
    }

    fn cells_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.value.get_mut("cells").and_then(Value::as_array_mut)
    }

    fn stored_signature(&self) -> Option<&str> {
        self.value
            .get("metadata")
            .and_then(|m| m.get(SIGNATURE_KEY))
            .and_then(Value::as_str)
    }
}

/// Computes and checks the integrity signature recorded in a notebook's
/// metadata. Code cells from a document whose recorded signature matches
/// the recomputed one are marked trusted; everything else is untrusted.
#[derive(Debug, Clone)]
pub struct NotebookSigner {
    secret: String,
}

impl NotebookSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    /// Digest over the document with any prior signature removed, so
    /// signing is idempotent.
    fn digest(&self, nb: &Notebook) -> String {
        let mut doc = nb.value.clone();
        if let Some(meta) = doc.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.remove(SIGNATURE_KEY);
        }
        let serialized = doc.to_string();
        let hash = md5::compute([self.secret.as_bytes(), serialized.as_bytes()].concat());
        format!("md5:{}", hex::encode(hash.0))
    }

    /// Record the current signature before upload.
    pub fn check_and_sign(&self, nb: &mut Notebook) {
        let signature = self.digest(nb);
        if let Some(obj) = nb.value.as_object_mut() {
            let meta = obj.entry("metadata").or_insert_with(|| json!({}));
            if let Some(meta) = meta.as_object_mut() {
                meta.insert(SIGNATURE_KEY.to_string(), Value::String(signature));
            }
        }
    }

    /// Mark code cells trusted iff the recorded signature still matches
    /// the document.
    pub fn mark_trusted_cells(&self, nb: &mut Notebook) {
        let expected = self.digest(nb);
        let trusted = nb.stored_signature() == Some(expected.as_str());
        debug!("mark_trusted_cells: trusted={}", trusted);
        if let Some(cells) = nb.cells_mut() {
            for cell in cells {
                if cell.get("cell_type").and_then(Value::as_str) != Some("code") {
                    continue;
                }
                if let Some(cell) = cell.as_object_mut() {
                    let meta = cell.entry("metadata").or_insert_with(|| json!({}));
                    if let Some(meta) = meta.as_object_mut() {
                        meta.insert("trusted".to_string(), Value::Bool(trusted));
                    }
                }
            }
        }
    }
}
