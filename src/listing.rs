//! Translation of raw store listings into content models
//!
//! The store reports last-modified in two different textual formats
//! depending on which API produced the value: bucket listings use one
//! shape, single-object metadata another. Callers must pick the parser
//! matching the API they called; a mismatch is an error, not a guess.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;

use crate::error::StoreError;
use crate::keymap::KeyMap;
use crate::model::{ContentModel, ContentType};
use crate::notebook::NOTEBOOK_EXT;
use crate::storage::ObjectEntry;

/// Which store API produced a raw last-modified string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Entries returned by a bucket listing.
    BucketList,
    /// Metadata of a single fetched object.
    ObjectGet,
}

impl TimeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::BucketList => "%Y-%m-%dT%H:%M:%S%.3fZ",
            TimeFormat::ObjectGet => "%a, %d %b %Y %H:%M:%S GMT",
        }
    }
}

/// Parse a raw last-modified string with the format matching its API.
pub fn parse_last_modified(raw: &str, format: TimeFormat) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, format.as_str())
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::TimestampParse {
            raw: raw.to_string(),
            reason: e.to_string(),
        })
}

/// A single listing pass split into the three disjoint entry sets.
#[derive(Debug, Default)]
pub struct ListingPartition {
    pub dirs: Vec<ObjectEntry>,
    pub notebooks: Vec<ObjectEntry>,
    pub files: Vec<ObjectEntry>,
}

/// Builds host-facing models out of raw listing entries.
#[derive(Debug, Clone)]
pub struct ListingTranslator {
    keys: KeyMap,
}

impl ListingTranslator {
    pub fn new(keys: KeyMap) -> Self {
        Self { keys }
    }

    /// Directory model for a listed prefix. Listed prefixes carry no
    /// timestamp from the store, so last_modified is synthesized as
    /// now; the host only uses it for HTTP caching headers.
    pub fn entry_to_directory_model(&self, entry: &ObjectEntry) -> ContentModel {
        let name = self.keys.dir_name_from_key(&entry.key);
        let path = self.logical_dir_path(&entry.key);
        debug!("entry_to_directory_model: {} -> {}", entry.key, path);
        let mut model = ContentModel::empty(ContentType::Directory, name, path);
        model.last_modified = Some(Utc::now());
        model
    }

    pub fn entry_to_file_model(
        &self,
        entry: &ObjectEntry,
        format: TimeFormat,
    ) -> Result<ContentModel, StoreError> {
        self.leaf_model(entry, format, ContentType::File)
    }

    pub fn entry_to_notebook_model(
        &self,
        entry: &ObjectEntry,
        format: TimeFormat,
    ) -> Result<ContentModel, StoreError> {
        self.leaf_model(entry, format, ContentType::Notebook)
    }

    fn leaf_model(
        &self,
        entry: &ObjectEntry,
        format: TimeFormat,
        kind: ContentType,
    ) -> Result<ContentModel, StoreError> {
        let raw = entry
            .last_modified
            .as_deref()
            .ok_or_else(|| StoreError::TimestampParse {
                raw: String::new(),
                reason: format!("no last-modified reported for {}", entry.key),
            })?;
        let last_modified = parse_last_modified(raw, format)?;
        let mut model = ContentModel::empty(
            kind,
            self.keys.leaf_name_from_key(&entry.key),
            self.keys.strip_prefix(&entry.key),
        );
        model.last_modified = Some(last_modified);
        debug!("leaf_model: {} -> {:?} {}", entry.key, kind, model.path);
        Ok(model)
    }

    /// Directory keys end with the delimiter; the logical path exposed
    /// to the host does not.
    fn logical_dir_path(&self, key: &str) -> String {
        self.keys
            .strip_prefix(key)
            .trim_end_matches(self.keys.delimiter())
            .to_string()
    }

    /// Partition a listing under `dir_key` into subdirectories,
    /// notebooks and plain files. Every entry lands in exactly one set;
    /// the queried key itself lands in none of them.
    pub fn partition(&self, entries: Vec<ObjectEntry>, dir_key: &str) -> ListingPartition {
        let delimiter = self.keys.delimiter();
        let mut partition = ListingPartition::default();
        for entry in entries {
            if entry.key == dir_key {
                continue;
            }
            if entry.key.ends_with(delimiter) {
                partition.dirs.push(entry);
            } else if entry.key.ends_with(NOTEBOOK_EXT) {
                partition.notebooks.push(entry);
            } else {
                partition.files.push(entry);
            }
        }
        partition
    }
}
