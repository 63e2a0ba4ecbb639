//! Filesystem-backed object store implementation
//!
//! Maps keys onto files under a base directory, for development runs
//! and integration tests without a real bucket. Listings reproduce the
//! flat-namespace delimiter grouping of a bucket listing. Keys are
//! assumed to use the default `/` delimiter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error::StoreError;
use crate::listing::TimeFormat;
use crate::storage::{ObjectEntry, ObjectStore};

/// Local filesystem object store
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .map_err(|e| StoreError::Backend(format!("creating {}: {}", base_path.display(), e)))?;
        info!("local object store rooted at {}", base_path.display());
        Ok(Self { base_path })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            if !segment.is_empty() {
                path.push(segment);
            }
        }
        path
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<(String, fs::Metadata)>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, keys)?;
            } else {
                let rel = match path.strip_prefix(&self.base_path) {
                    Ok(rel) => rel,
                    Err(_) => continue,
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push((key, entry.metadata()?));
            }
        }
        Ok(())
    }

    fn modified(metadata: &fs::Metadata) -> Result<DateTime<Utc>, StoreError> {
        let modified = metadata
            .modified()
            .map_err(|e| StoreError::Backend(format!("reading mtime: {}", e)))?;
        Ok(modified.into())
    }
}

impl ObjectStore for LocalObjectStore {
    fn list(&self, prefix: &str, delimiter: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let mut all = Vec::new();
        self.collect_keys(&self.base_path, &mut all)
            .map_err(|e| StoreError::Backend(format!("listing {}: {}", self.base_path.display(), e)))?;
        all.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entries = Vec::new();
        let mut last_common: Option<String> = None;
        for (key, metadata) in &all {
            if !key.starts_with(prefix) {
                continue;
            }
            let rest = &key[prefix.len()..];
            match rest.find(delimiter) {
                Some(index) => {
                    let common = format!("{}{}{}", prefix, &rest[..index], delimiter);
                    if last_common.as_deref() != Some(common.as_str()) {
                        entries.push(ObjectEntry {
                            key: common.clone(),
                            last_modified: None,
                            size: None,
                        });
                        last_common = Some(common);
                    }
                }
                None => {
                    entries.push(ObjectEntry {
                        key: key.clone(),
                        last_modified: Some(
                            Self::modified(metadata)?
                                .format(TimeFormat::BucketList.as_str())
                                .to_string(),
                        ),
                        size: Some(metadata.len()),
                    });
                }
            }
        }
        debug!("local list: {} entries under {}", entries.len(), prefix);
        Ok(entries)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError> {
        let path = self.key_path(key);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(Some(ObjectEntry {
                key: key.to_string(),
                last_modified: Some(
                    Self::modified(&metadata)?
                        .format(TimeFormat::ObjectGet.as_str())
                        .to_string(),
                ),
                size: Some(metadata.len()),
            })),
            // a directory at the path means the key is only a prefix
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Backend(format!("stat {}: {}", path.display(), e))),
        }
    }

    fn fetch(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.key_path(key);
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Backend(format!("reading {}: {}", path.display(), e))),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("creating {}: {}", parent.display(), e)))?;
        }
        fs::write(&path, data)
            .map_err(|e| StoreError::Backend(format!("writing {}: {}", path.display(), e)))?;
        debug!("local put: {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    fn copy(&self, dst_key: &str, src_bucket: &str, src_key: &str) -> Result<(), StoreError> {
        // one local tree only; the source bucket name is informational
        debug!("local copy: {}/{} -> {}", src_bucket, src_key, dst_key);
        let src = self.key_path(src_key);
        if !src.is_file() {
            return Err(StoreError::NotFound(src_key.to_string()));
        }
        let dst = self.key_path(dst_key);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("creating {}: {}", parent.display(), e)))?;
        }
        fs::copy(&src, &dst)
            .map_err(|e| StoreError::Backend(format!("copying to {}: {}", dst.display(), e)))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Backend(format!("removing {}: {}", path.display(), e))),
        }
    }
}
