//! Object store client abstraction
//!
//! This module provides an abstraction over object storage backends,
//! allowing the contents layer to run against any S3-compatible store
//! without affecting higher-level code. Calls are blocking network I/O;
//! timeouts and retry policy belong to the implementation, not here.

pub mod config;
pub mod local_store;
pub mod mock_store;

use bytes::Bytes;

use crate::error::StoreError;

/// One entry from a listing or a single-object metadata fetch.
///
/// `last_modified` is the raw string exactly as the store reported it.
/// Which textual format it uses depends on the API that produced the
/// entry (see `listing::TimeFormat`); listed common prefixes carry no
/// timestamp at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: Option<String>,
    pub size: Option<u64>,
}

/// Trait defining the object store client interface
pub trait ObjectStore: Send + Sync {
    /// List keys under a prefix, grouping on the delimiter the way
    /// bucket listings do: direct objects plus one entry per common
    /// prefix (key ending in the delimiter, no timestamp), in
    /// lexicographic key order.
    fn list(&self, prefix: &str, delimiter: &str) -> Result<Vec<ObjectEntry>, StoreError>;

    /// Metadata for an exact key; Ok(None) when the key is absent.
    fn get_metadata(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError>;

    /// Fetch the bytes of an object.
    fn fetch(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Store bytes at a key, overwriting any existing object.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Server-side copy from `src_bucket`/`src_key` to `dst_key`.
    fn copy(&self, dst_key: &str, src_bucket: &str, src_key: &str) -> Result<(), StoreError>;

    /// Remove the object at a key. Removing an absent key is not an
    /// error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}
