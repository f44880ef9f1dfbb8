//! Local file index port (driven/secondary port)
//!
//! This module defines the interface to the local set of theme source files
//! and the bookkeeping the sync engine shares with it: the set of keys still
//! awaiting synchronization ("dirty" keys) and the latest upload errors per key.
//!
//! ## Design Notes
//!
//! - Content is read lazily through [`ILocalFileIndex::read_content`]; a read
//!   failure marks the file as malformed for the current run.
//! - The ignore predicate belongs to the index. The engine only consumes its
//!   result and assumes nothing about pattern syntax.
//! - [`LocalSyncState`] is mutated by every completing batch, possibly from
//!   several tasks at once, so it is backed by concurrent maps.

use std::collections::BTreeMap;

use dashmap::{DashMap, DashSet};

use crate::domain::asset::{AssetContent, AssetResult, Checksum, LocalFile};
use crate::domain::newtypes::AssetKey;

// ============================================================================
// LocalSyncState
// ============================================================================

/// Dirty key set and upload error map shared between the index and the engine
#[derive(Debug, Default)]
pub struct LocalSyncState {
    dirty: DashSet<AssetKey>,
    upload_errors: DashMap<AssetKey, Vec<String>>,
}

impl LocalSyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the dirty set with exactly the given keys
    pub fn narrow_dirty<I>(&self, keys: I)
    where
        I: IntoIterator<Item = AssetKey>,
    {
        self.dirty.clear();
        for key in keys {
            self.dirty.insert(key);
        }
    }

    /// Adds a key to the dirty set
    pub fn mark_dirty(&self, key: AssetKey) {
        self.dirty.insert(key);
    }

    /// Removes a key from the dirty set once its batch has resolved
    pub fn mark_settled(&self, key: &AssetKey) {
        self.dirty.remove(key);
    }

    pub fn is_dirty(&self, key: &AssetKey) -> bool {
        self.dirty.contains(key)
    }

    /// Dirty keys in sorted order
    pub fn dirty_keys(&self) -> Vec<AssetKey> {
        let mut keys: Vec<AssetKey> = self.dirty.iter().map(|k| k.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Keeps the upload error map consistent with a per-file result
    ///
    /// A successful result clears the entry, a failed one sets it.
    pub fn apply_result(&self, result: &AssetResult) {
        if result.success {
            self.upload_errors.remove(&result.key);
        } else {
            self.upload_errors
                .insert(result.key.clone(), result.reasons().to_vec());
        }
    }

    pub fn upload_error(&self, key: &AssetKey) -> Option<Vec<String>> {
        self.upload_errors.get(key).map(|entry| entry.value().clone())
    }

    /// Snapshot of all upload errors, ordered by key
    pub fn upload_errors(&self) -> BTreeMap<AssetKey, Vec<String>> {
        self.upload_errors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

// ============================================================================
// ILocalFileIndex
// ============================================================================

/// Port trait for the local theme file set
#[async_trait::async_trait]
pub trait ILocalFileIndex: Send + Sync {
    /// Resolves once the initial population of the index is complete
    ///
    /// # Errors
    /// Returns an error if the index could not be populated
    async fn ready(&self) -> anyhow::Result<()>;

    /// Checksums of every local file, ignore filters not applied
    fn checksums(&self) -> Vec<Checksum>;

    /// Metadata snapshot of a single file
    fn file(&self, key: &AssetKey) -> Option<LocalFile>;

    /// Whether a file with this key exists locally
    fn contains(&self, key: &AssetKey) -> bool {
        self.file(key).is_some()
    }

    /// Reads the content of a file for upload
    ///
    /// # Errors
    /// Returns an error if the file is missing or its content cannot be encoded
    async fn read_content(&self, key: &AssetKey) -> anyhow::Result<AssetContent>;

    /// Removes ignored entries from a checksum list
    fn apply_ignore_filters(&self, checksums: Vec<Checksum>) -> Vec<Checksum>;

    /// Dirty set and upload errors owned by this index
    fn sync_state(&self) -> &LocalSyncState;
}
