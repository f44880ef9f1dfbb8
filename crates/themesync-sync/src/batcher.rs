//! Greedy count/size bounded batching
//!
//! Bulk uploads are limited both in the number of files per request and in
//! the total byte size of a request. Files are packed greedily in input
//! order; a file larger than the byte limit travels alone.

use themesync_core::config::{BatchingConfig, MAX_BATCH_BYTESIZE, MAX_BATCH_FILE_COUNT};
use themesync_core::domain::{AssetKey, ChecksumWithSize};

/// Limits applied to a single bulk upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_file_count: usize,
    pub max_bytesize: u64,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_file_count: MAX_BATCH_FILE_COUNT,
            max_bytesize: MAX_BATCH_BYTESIZE,
        }
    }
}

impl From<&BatchingConfig> for BatchLimits {
    fn from(config: &BatchingConfig) -> Self {
        Self {
            max_file_count: config.max_file_count.max(1),
            max_bytesize: config.max_bytesize.max(1),
        }
    }
}

/// Files sent together in one bulk upload request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBatch {
    files: Vec<ChecksumWithSize>,
    bytesize: u64,
}

impl FileBatch {
    fn push(&mut self, file: ChecksumWithSize) {
        self.bytesize += file.size;
        self.files.push(file);
    }

    fn accepts(&self, file: &ChecksumWithSize, limits: &BatchLimits) -> bool {
        self.files.is_empty()
            || (self.files.len() < limits.max_file_count
                && self.bytesize + file.size <= limits.max_bytesize)
    }

    pub fn files(&self) -> &[ChecksumWithSize] {
        &self.files
    }

    pub fn keys(&self) -> impl Iterator<Item = &AssetKey> {
        self.files.iter().map(|f| &f.key)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of the file sizes in bytes
    pub fn bytesize(&self) -> u64 {
        self.bytesize
    }
}

/// Packs files into batches, preserving input order
///
/// Every batch holds at most `max_file_count` files and at most
/// `max_bytesize` bytes, except a batch made of a single oversized file.
pub fn create_batches(
    files: impl IntoIterator<Item = ChecksumWithSize>,
    limits: &BatchLimits,
) -> Vec<FileBatch> {
    let mut batches = Vec::new();
    let mut current = FileBatch::default();

    for file in files {
        if !current.accepts(&file, limits) {
            batches.push(std::mem::take(&mut current));
        }
        current.push(file);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
