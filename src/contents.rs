//! Contents operations over the object store
//!
//! The operations surface the host framework invokes: get, save,
//! delete, rename, existence probes and untitled-name allocation. Each
//! operation derives its keys, talks to the store and rebuilds models
//! from live reads; nothing is cached across requests and no state is
//! shared between them, so concurrent calls on distinct paths need no
//! coordination. Concurrent writes to the same path race at the store
//! with last-write-wins outcome.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use serde_json::Value;

use crate::config::ContentsConfig;
use crate::error::StoreError;
use crate::keymap::KeyMap;
use crate::listing::{ListingPartition, ListingTranslator, TimeFormat};
use crate::model::{ContentModel, ContentType, Format};
use crate::notebook::{Notebook, NotebookSigner, NOTEBOOK_EXT};
use crate::storage::mock_store::MockObjectStore;
use crate::storage::{ObjectEntry, ObjectStore};

/// Cap on the untitled-name increment scan.
const MAX_UNTITLED_SCAN: usize = 10_000;

/// Operation surface the host framework invokes.
pub trait Contents: Send + Sync {
    /// Model for a path. `kind` dispatches the lookup; without it,
    /// notebook type is inferred from the extension, anything else is
    /// treated as a plain file. Content is only populated on request.
    fn get(
        &self,
        path: &str,
        content: bool,
        kind: Option<ContentType>,
    ) -> Result<ContentModel, StoreError>;

    /// Persist a model at a path and return the content-free model of
    /// what was written.
    fn save(&self, model: &ContentModel, path: &str) -> Result<ContentModel, StoreError>;

    /// Remove the single object at the path's key. Directories are
    /// implicit prefixes, so there is nothing recursive to remove.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Move an object via copy-then-delete. Not atomic: a crash between
    /// the two steps leaves both objects present.
    fn rename(&self, old_path: &str, new_path: &str) -> Result<ContentModel, StoreError>;

    fn dir_exists(&self, path: &str) -> Result<bool, StoreError>;

    fn file_exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Generic existence probe the host uses; files and notebooks only.
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.file_exists(path)
    }

    /// The store has no hidden-path concept.
    fn is_hidden(&self, _path: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    /// Create an empty model with a generated untitled name under
    /// `path`.
    fn new_untitled(
        &self,
        path: &str,
        kind: Option<ContentType>,
        ext: &str,
    ) -> Result<ContentModel, StoreError>;
}

/// Contents manager backed by a flat object store.
impl std::fmt::Debug for ObjectContentsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectContentsManager")
            .field("bucket", &self.bucket)
            .field("keys", &self.keys)
            .field("translator", &self.translator)
            .field("signer", &self.signer)
            .field("untitled_notebook", &self.untitled_notebook)
            .field("untitled_file", &self.untitled_file)
            .field("untitled_directory", &self.untitled_directory)
            .finish_non_exhaustive()
    }
}

pub struct ObjectContentsManager {
    bucket: String,
    keys: KeyMap,
    translator: ListingTranslator,
    signer: NotebookSigner,
    store: Arc<dyn ObjectStore>,
    untitled_notebook: String,
    untitled_file: String,
    untitled_directory: String,
}

impl ObjectContentsManager {
    /// Build a manager from configuration and an injected store client.
    /// The root URI is parsed and validated here, once.
    pub fn new(config: &ContentsConfig, store: Arc<dyn ObjectStore>) -> Result<Self, StoreError> {
        let (bucket, prefix) = KeyMap::parse_root_uri(&config.base_uri, &config.delimiter)?;
        let keys = KeyMap::new(&prefix, &config.delimiter);
        info!(
            "initialized base_uri: {} bucket: {} prefix: {}",
            config.base_uri,
            bucket,
            keys.prefix()
        );
        Ok(Self {
            bucket,
            translator: ListingTranslator::new(keys.clone()),
            keys,
            signer: NotebookSigner::new(&config.signature_key),
            store,
            untitled_notebook: config.untitled_notebook.clone(),
            untitled_file: config.untitled_file.clone(),
            untitled_directory: config.untitled_directory.clone(),
        })
    }

    /// Build a manager with the backend named in the configuration.
    pub fn from_config(config: &ContentsConfig) -> Result<Self, StoreError> {
        let store = config.storage.create_store()?;
        Self::new(config, store)
    }

    /// Mock-backed manager for tests, returning the mock alongside so
    /// tests can seed and inspect the store.
    pub fn for_testing(
        config: &ContentsConfig,
    ) -> Result<(Self, Arc<MockObjectStore>), StoreError> {
        let store = Arc::new(MockObjectStore::new());
        let manager = Self::new(config, store.clone())?;
        Ok((manager, store))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn delimiter(&self) -> &str {
        self.keys.delimiter()
    }

    /// Bytes of the object at a logical path, bypassing model building.
    pub fn fetch_bytes(&self, path: &str) -> Result<Bytes, StoreError> {
        self.store.fetch(&self.keys.path_to_key(path))
    }

    /// Upload bytes at a logical path, bypassing model validation.
    pub fn put_bytes(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let key = self.keys.path_to_key(path);
        debug!("uploading {} bytes to bucket: {} : {}", data.len(), self.bucket, key);
        self.store.put(&key, data)
    }

    /// Raw metadata entry for a logical path, None when absent.
    pub fn object_entry(&self, path: &str) -> Result<Option<ObjectEntry>, StoreError> {
        self.store.get_metadata(&self.keys.path_to_key(path))
    }

    fn list_partition(&self, path: &str) -> Result<ListingPartition, StoreError> {
        let key = self.keys.path_to_dir_key(path);
        debug!("listing bucket:{} under:{}", self.bucket, key);
        let entries = self.store.list(&key, self.keys.delimiter())?;
        Ok(self.translator.partition(entries, &key))
    }

    /// Child models for a directory path: subdirectories, then
    /// notebooks, then plain files, each in store listing order.
    fn directory_listing(&self, path: &str) -> Result<Vec<ContentModel>, StoreError> {
        let partition = self.list_partition(path)?;
        let mut children =
            Vec::with_capacity(partition.dirs.len() + partition.notebooks.len() + partition.files.len());
        for entry in &partition.dirs {
            children.push(self.translator.entry_to_directory_model(entry));
        }
        for entry in &partition.notebooks {
            children.push(self.translator.entry_to_notebook_model(entry, TimeFormat::BucketList)?);
        }
        for entry in &partition.files {
            children.push(self.translator.entry_to_file_model(entry, TimeFormat::BucketList)?);
        }
        Ok(children)
    }

    fn get_directory(&self, path: &str, content: bool) -> Result<ContentModel, StoreError> {
        let key = self.keys.path_to_dir_key(path);
        // the directory itself never appears in a listing; synthesize
        // an entry for it
        let synthetic = ObjectEntry {
            key,
            last_modified: None,
            size: None,
        };
        let mut model = self.translator.entry_to_directory_model(&synthetic);
        if content {
            let mut items = Vec::new();
            for child in self.directory_listing(path)? {
                items.push(
                    serde_json::to_value(child)
                        .map_err(|e| StoreError::Backend(e.to_string()))?,
                );
            }
            model.content = Some(Value::Array(items));
            model.format = Some(Format::Json);
        }
        Ok(model)
    }

    fn get_notebook(&self, path: &str, content: bool) -> Result<ContentModel, StoreError> {
        let key = self.keys.path_to_key(path);
        let entry = self
            .store
            .get_metadata(&key)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let mut model = self.translator.entry_to_notebook_model(&entry, TimeFormat::ObjectGet)?;
        if content {
            let bytes = self.store.fetch(&key)?;
            let mut nb = parse_notebook(path, &bytes)?;
            self.signer.mark_trusted_cells(&mut nb);
            model.message = nb.validate();
            model.content = Some(nb.into_value());
            model.format = Some(Format::Json);
        }
        Ok(model)
    }

    fn get_file(&self, path: &str, content: bool) -> Result<ContentModel, StoreError> {
        let key = self.keys.path_to_key(path);
        let entry = self
            .store
            .get_metadata(&key)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let mut model = self.translator.entry_to_file_model(&entry, TimeFormat::ObjectGet)?;
        if content {
            let bytes = self
                .store
                .fetch(&key)
                .map_err(|e| StoreError::UnreadableContent(format!("{}: {}", path, e)))?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|e| StoreError::UnreadableContent(format!("{}: {}", path, e)))?;
            model.content = Some(Value::String(text));
            model.mimetype = Some("text/plain".to_string());
            model.format = Some(Format::Text);
        }
        Ok(model)
    }

    fn save_notebook(&self, path: &str, nb: &Notebook) -> Result<(), StoreError> {
        let bytes = nb.to_bytes()?;
        self.put_bytes(path, &bytes)
    }

    fn save_file(
        &self,
        path: &str,
        content: &Value,
        format: Option<Format>,
    ) -> Result<(), StoreError> {
        if format != Some(Format::Text) {
            return Err(StoreError::UnsupportedFormat(
                "Only text files are supported".to_string(),
            ));
        }
        let text = content.as_str().ok_or_else(|| {
            StoreError::BadRequest(format!("file content for {} must be a string", path))
        })?;
        self.put_bytes(path, text.as_bytes())
    }

    fn join_path(&self, dir_path: &str, name: &str) -> String {
        if dir_path.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", dir_path, self.keys.delimiter(), name)
        }
    }

    /// First untitled name not taken by a file or directory under
    /// `dir_path`. Index zero is the bare template; later candidates
    /// carry the index between template and extension.
    fn increment_filename(
        &self,
        template: &str,
        ext: &str,
        insert: &str,
        dir_path: &str,
    ) -> Result<String, StoreError> {
        for index in 0..MAX_UNTITLED_SCAN {
            let name = if index == 0 {
                format!("{}{}", template, ext)
            } else {
                format!("{}{}{}{}", template, insert, index, ext)
            };
            let candidate = self.join_path(dir_path, &name);
            if !self.file_exists(&candidate)? && !self.dir_exists(&candidate)? {
                return Ok(name);
            }
        }
        Err(StoreError::BadRequest(format!(
            "Unable to allocate an untitled name under '{}'",
            dir_path
        )))
    }
}

impl Contents for ObjectContentsManager {
    fn get(
        &self,
        path: &str,
        content: bool,
        kind: Option<ContentType>,
    ) -> Result<ContentModel, StoreError> {
        debug!("get: path={} content={} type={:?}", path, content, kind);
        match kind {
            Some(ContentType::Directory) => self.get_directory(path, content),
            Some(ContentType::Notebook) => self.get_notebook(path, content),
            Some(ContentType::File) => self.get_file(path, content),
            None if path.ends_with(NOTEBOOK_EXT) => self.get_notebook(path, content),
            None => self.get_file(path, content),
        }
    }

    fn save(&self, model: &ContentModel, path: &str) -> Result<ContentModel, StoreError> {
        debug!("save: path={} type={:?}", path, model.kind);
        let mut message = None;
        match (model.kind, model.content.as_ref()) {
            (ContentType::Directory, _) => {
                // directories are implicit prefixes; nothing to write
            }
            (_, None) => {
                return Err(StoreError::BadRequest("No file content provided".to_string()))
            }
            (ContentType::Notebook, Some(content)) => {
                let mut nb = Notebook::from_value(content.clone())
                    .map_err(|reason| StoreError::UnreadableContent(format!("{}: {}", path, reason)))?;
                self.signer.check_and_sign(&mut nb);
                self.save_notebook(path, &nb)?;
                message = nb.validate();
            }
            (ContentType::File, Some(content)) => {
                self.save_file(path, content, model.format)?;
            }
        }
        let mut saved = self.get(path, false, Some(model.kind))?;
        saved.content = None;
        saved.message = message;
        Ok(saved)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let key = self.keys.path_to_key(path);
        info!("removing object in bucket: {} : {}", self.bucket, key);
        self.store.delete(&key)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<ContentModel, StoreError> {
        debug!("rename: {} -> {}", old_path, new_path);
        if old_path == new_path {
            return self.get(old_path, false, None);
        }
        let src_key = self.keys.path_to_key(old_path);
        let dst_key = self.keys.path_to_key(new_path);
        if self.store.get_metadata(&dst_key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "Object with name already exists: {}",
                dst_key
            )));
        }
        info!(
            "copying object in bucket: {} from {} to {}",
            self.bucket, src_key, dst_key
        );
        self.store.copy(&dst_key, &self.bucket, &src_key)?;
        info!("removing object in bucket: {} : {}", self.bucket, src_key);
        self.store.delete(&src_key)?;
        self.get(new_path, false, None)
    }

    fn dir_exists(&self, path: &str) -> Result<bool, StoreError> {
        debug!("dir_exists: {}", path);
        if path.is_empty() {
            // the root always exists regardless of store state
            return Ok(true);
        }
        let key = self.keys.path_to_dir_key(path);
        let entries = self.store.list(&key, self.keys.delimiter())?;
        Ok(!entries.is_empty())
    }

    fn file_exists(&self, path: &str) -> Result<bool, StoreError> {
        debug!("file_exists: {}", path);
        if path.is_empty() {
            return Ok(false);
        }
        let key = self.keys.path_to_key(path);
        match self.store.get_metadata(&key)? {
            // a key ending in the delimiter is a directory marker, not
            // a file
            Some(entry) => Ok(!entry.key.ends_with(self.keys.delimiter())),
            None => Ok(false),
        }
    }

    fn new_untitled(
        &self,
        path: &str,
        kind: Option<ContentType>,
        ext: &str,
    ) -> Result<ContentModel, StoreError> {
        debug!("new_untitled: path={} type={:?} ext={}", path, kind, ext);
        let kind = match kind {
            Some(kind) => kind,
            None if ext == NOTEBOOK_EXT => ContentType::Notebook,
            None => ContentType::File,
        };
        let (template, ext, insert) = match kind {
            ContentType::Directory => (self.untitled_directory.as_str(), "", " "),
            ContentType::Notebook => (self.untitled_notebook.as_str(), NOTEBOOK_EXT, ""),
            ContentType::File => (self.untitled_file.as_str(), ext, ""),
        };
        let name = self.increment_filename(template, ext, insert, path)?;
        let full_path = self.join_path(path, &name);
        info!("new_untitled: allocating {}", full_path);

        let mut model = ContentModel::empty(kind, name, full_path.clone());
        match kind {
            ContentType::Notebook => {
                model.content = Some(Notebook::empty().into_value());
            }
            ContentType::File => {
                model.content = Some(Value::String(String::new()));
                model.format = Some(Format::Text);
            }
            ContentType::Directory => {}
        }
        self.save(&model, &full_path)
    }
}

fn parse_notebook(path: &str, bytes: &[u8]) -> Result<Notebook, StoreError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StoreError::UnreadableContent(format!("{}: {}", path, e)))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::UnreadableContent(format!("{}: {}", path, e)))?;
    Notebook::from_value(value)
        .map_err(|reason| StoreError::UnreadableContent(format!("{}: {}", path, reason)))
}
