//! Content models returned to the host
//!
//! The structured representations of directories, files and notebooks
//! the host application consumes as JSON. Models are ephemeral: built
//! from live store reads on each request, never cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of node in the workspace tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Directory,
    Notebook,
    File,
}

/// Serialization format of a model's content payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Text,
}

/// Structured representation of a directory, notebook or file
///
/// `created` is always absent: the store cannot supply creation times.
/// `writable` is always true: no ACL concept is surfaced here. `content`
/// is populated only when explicitly requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub writable: bool,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub mimetype: Option<String>,
    pub content: Option<Value>,
    pub format: Option<Format>,
    /// Non-fatal validation output attached by save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ContentModel {
    /// Content-free scaffold of the given kind.
    pub fn empty(kind: ContentType, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            writable: true,
            created: None,
            last_modified: None,
            mimetype: None,
            content: None,
            format: None,
            message: None,
        }
    }
}

/// Descriptor for a notebook's checkpoint slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointModel {
    pub id: String,
    pub last_modified: DateTime<Utc>,
}
