//! Path to object-key translation
//!
//! Pure string mapping between the logical workspace tree and the flat
//! object-store namespace. No I/O happens here; everything else in the
//! crate derives its keys through this module.

use log::debug;

use crate::error::StoreError;

/// Scheme marker required on the root URI.
pub const URI_SCHEME: &str = "s3://";

/// Derives object-store keys from logical paths and back.
///
/// The stored prefix always ends with the delimiter unless it is empty
/// (content rooted at the top of the bucket).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMap {
    prefix: String,
    delimiter: String,
}

impl KeyMap {
    /// Split a root URI into bucket name and key prefix.
    pub fn parse_root_uri(uri: &str, delimiter: &str) -> Result<(String, String), StoreError> {
        let rest = uri
            .strip_prefix(URI_SCHEME)
            .ok_or_else(|| StoreError::InvalidUriScheme {
                uri: uri.to_string(),
            })?;
        match rest.split_once(delimiter) {
            Some((bucket, prefix)) => Ok((bucket.to_string(), prefix.to_string())),
            None => Ok((rest.to_string(), String::new())),
        }
    }

    pub fn new(prefix: &str, delimiter: &str) -> Self {
        let mut prefix = prefix.to_string();
        if !prefix.is_empty() && !prefix.ends_with(delimiter) {
            prefix.push_str(delimiter);
        }
        Self {
            prefix,
            delimiter: delimiter.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Exact-object key for a logical path (files, notebooks).
    pub fn path_to_key(&self, path: &str) -> String {
        let trimmed = path
            .trim_start_matches(self.delimiter.as_str())
            .trim_end_matches(self.delimiter.as_str());
        format!("{}{}", self.prefix, trimmed)
    }

    /// Listing key for a logical path: trailing delimiter appended for
    /// non-root paths. The root listing key is the prefix itself, so no
    /// double delimiter can appear at the container boundary.
    pub fn path_to_dir_key(&self, path: &str) -> String {
        let key = self.path_to_key(path);
        if key == self.prefix {
            key
        } else {
            format!("{}{}", key, self.delimiter)
        }
    }

    /// Name of the directory a listing key points at: the second-to-last
    /// delimiter-separated segment. Keys with too few segments yield an
    /// empty name rather than an error.
    pub fn dir_name_from_key(&self, key: &str) -> String {
        let mut segments = key.rsplitn(3, self.delimiter.as_str());
        segments.next();
        segments.next().unwrap_or("").to_string()
    }

    /// Final segment after the last delimiter.
    pub fn leaf_name_from_key(&self, key: &str) -> String {
        key.rsplit(self.delimiter.as_str())
            .next()
            .unwrap_or("")
            .to_string()
    }

    /// Logical path for a full key. Exact prefix-length slicing: a
    /// recurrence of the prefix string later in the key is left alone.
    pub fn strip_prefix(&self, key: &str) -> String {
        match key.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.to_string(),
            None => {
                debug!("strip_prefix: key {} outside configured prefix {}", key, self.prefix);
                key.to_string()
            }
        }
    }
}
