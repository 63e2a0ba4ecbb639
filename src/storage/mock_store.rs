//! Mock implementation of ObjectStore for testing

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;

use crate::error::StoreError;
use crate::listing::TimeFormat;
use crate::storage::{ObjectEntry, ObjectStore};

struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// In-memory ObjectStore for testing
///
/// Keys are held sorted so listings come back in lexicographic order
/// like a real bucket listing, and the raw timestamp strings reproduce
/// the store's dual formats: listing entries carry the bucket-listing
/// shape, metadata fetches the single-object shape.
pub struct MockObjectStore {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    puts: AtomicUsize,
    copies: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            puts: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Seed an object without touching the call counters.
    pub fn insert_object(&self, key: &str, data: &[u8]) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                last_modified: Utc::now(),
            },
        );
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Check whether an object exists at an exact key.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Clear all objects from the store.
    pub fn clear(&self) {
        self.objects.lock().unwrap().clear();
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn copy_count(&self) -> usize {
        self.copies.load(Ordering::Relaxed)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::Relaxed)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Calls that changed store state: put + copy + delete.
    pub fn mutation_count(&self) -> usize {
        self.put_count() + self.copy_count() + self.delete_count()
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MockObjectStore {
    fn list(&self, prefix: &str, delimiter: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        self.lists.fetch_add(1, Ordering::Relaxed);
        let objects = self.objects.lock().unwrap();
        let mut entries = Vec::new();
        let mut seen_prefixes = BTreeSet::new();
        for (key, object) in objects.iter() {
            if !key.starts_with(prefix) {
                continue;
            }
            let rest = &key[prefix.len()..];
            match rest.find(delimiter) {
                Some(index) => {
                    // deeper object: surfaces as a common prefix
                    let common = format!("{}{}{}", prefix, &rest[..index], delimiter);
                    if seen_prefixes.insert(common.clone()) {
                        entries.push(ObjectEntry {
                            key: common,
                            last_modified: None,
                            size: None,
                        });
                    }
                }
                None => {
                    entries.push(ObjectEntry {
                        key: key.clone(),
                        last_modified: Some(
                            object
                                .last_modified
                                .format(TimeFormat::BucketList.as_str())
                                .to_string(),
                        ),
                        size: Some(object.data.len() as u64),
                    });
                }
            }
        }
        debug!("mock list: {} entries under {}", entries.len(), prefix);
        Ok(entries)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(key).map(|object| ObjectEntry {
            key: key.to_string(),
            last_modified: Some(
                object
                    .last_modified
                    .format(TimeFormat::ObjectGet.as_str())
                    .to_string(),
            ),
            size: Some(object.data.len() as u64),
        }))
    }

    fn fetch(&self, key: &str) -> Result<Bytes, StoreError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let objects = self.objects.lock().unwrap();
        match objects.get(key) {
            Some(object) => Ok(Bytes::from(object.data.clone())),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn copy(&self, dst_key: &str, src_bucket: &str, src_key: &str) -> Result<(), StoreError> {
        self.copies.fetch_add(1, Ordering::Relaxed);
        debug!("mock copy: {}/{} -> {}", src_bucket, src_key, dst_key);
        let mut objects = self.objects.lock().unwrap();
        let data = match objects.get(src_key) {
            Some(object) => object.data.clone(),
            None => return Err(StoreError::NotFound(src_key.to_string())),
        };
        objects.insert(
            dst_key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        let mut objects = self.objects.lock().unwrap();
        objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::parse_last_modified;

    #[test]
    fn test_mock_store_basic_operations() {
        let store = MockObjectStore::new();
        assert_eq!(store.object_count(), 0);

        store.put("team/nb/a.txt", b"hello").unwrap();
        assert!(store.contains("team/nb/a.txt"));
        assert_eq!(store.fetch("team/nb/a.txt").unwrap(), Bytes::from("hello"));

        store.copy("team/nb/b.txt", "mybucket", "team/nb/a.txt").unwrap();
        assert!(store.contains("team/nb/b.txt"));

        store.delete("team/nb/a.txt").unwrap();
        assert!(!store.contains("team/nb/a.txt"));
        // deleting an absent key is fine
        store.delete("team/nb/a.txt").unwrap();
    }

    #[test]
    fn test_fetch_missing_key_is_not_found() {
        let store = MockObjectStore::new();
        assert!(matches!(
            store.fetch("nope").unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.copy("dst", "bucket", "nope").unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(store.get_metadata("nope").unwrap().is_none());
    }

    #[test]
    fn test_listing_groups_on_delimiter() {
        let store = MockObjectStore::new();
        store.insert_object("team/nb/a.ipynb", b"{}");
        store.insert_object("team/nb/sub/x.ipynb", b"{}");
        store.insert_object("team/nb/sub/deep/y.ipynb", b"{}");

        let entries = store.list("team/nb/", "/").unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["team/nb/a.ipynb", "team/nb/sub/"]);

        // the common prefix has no timestamp, the object does
        assert!(entries[1].last_modified.is_none());
        assert!(entries[0].last_modified.is_some());
    }

    #[test]
    fn test_timestamp_formats_differ_by_api() {
        let store = MockObjectStore::new();
        store.insert_object("k", b"data");

        let listed = &store.list("", "/").unwrap()[0];
        let raw = listed.last_modified.as_deref().unwrap();
        assert!(parse_last_modified(raw, TimeFormat::BucketList).is_ok());
        assert!(parse_last_modified(raw, TimeFormat::ObjectGet).is_err());

        let fetched = store.get_metadata("k").unwrap().unwrap();
        let raw = fetched.last_modified.as_deref().unwrap();
        assert!(parse_last_modified(raw, TimeFormat::ObjectGet).is_ok());
        assert!(parse_last_modified(raw, TimeFormat::BucketList).is_err());
    }

    #[test]
    fn test_call_counters() {
        let store = MockObjectStore::new();
        store.insert_object("k", b"data");
        assert_eq!(store.mutation_count(), 0);

        store.put("k2", b"x").unwrap();
        store.copy("k3", "bucket", "k").unwrap();
        store.delete("k2").unwrap();
        store.list("", "/").unwrap();
        store.fetch("k").unwrap();

        assert_eq!(store.put_count(), 1);
        assert_eq!(store.copy_count(), 1);
        assert_eq!(store.delete_count(), 1);
        assert_eq!(store.list_count(), 1);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(store.mutation_count(), 3);
    }
}
