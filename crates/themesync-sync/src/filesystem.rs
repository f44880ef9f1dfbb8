//! Filesystem-backed local file index (secondary/driven adapter)
//!
//! Implements [`ILocalFileIndex`] over a theme folder on disk using `tokio::fs`.
//!
//! ## Design Decisions
//!
//! - **Background scan**: [`FileSystemIndex::spawn`] returns immediately and
//!   walks the theme folders on a Tokio task; [`ILocalFileIndex::ready`]
//!   resolves once the walk has finished.
//! - **Checksums**: SHA-256 over the raw file bytes, lowercase hex.
//! - **Lazy content**: only metadata is kept in memory. Content is read from
//!   disk when a file is about to be uploaded.
//! - **Encoding**: text extensions travel as UTF-8 `value`, everything else as
//!   a base64 `attachment`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use base64::Engine;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use themesync_core::config::SyncConfig;
use themesync_core::domain::{AssetContent, AssetKey, Checksum, LocalFile};
use themesync_core::ports::{ILocalFileIndex, LocalSyncState};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::ignore::IgnoreFilter;

/// Top-level folders of a theme; anything else under the root is not indexed
pub const THEME_FOLDERS: [&str; 8] = [
    "assets",
    "blocks",
    "config",
    "layout",
    "locales",
    "sections",
    "snippets",
    "templates",
];

/// Extensions uploaded as text `value`
pub const TEXT_EXTENSIONS: &[&str] = &[
    "liquid", "json", "css", "scss", "js", "mjs", "ts", "svg", "txt", "html", "md", "map", "xml",
    "csv",
];

/// SHA-256 hex checksum of file content
pub fn content_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Whether the key is uploaded as text rather than as a base64 attachment
pub fn is_text_key(key: &AssetKey) -> bool {
    key.extension()
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Encodes raw file bytes for upload
///
/// # Errors
/// Returns an error if a text file is not valid UTF-8
pub fn encode_content(key: &AssetKey, bytes: Vec<u8>) -> anyhow::Result<AssetContent> {
    if is_text_key(key) {
        String::from_utf8(bytes)
            .map(AssetContent::Value)
            .map_err(|_| anyhow!("{key} is not valid UTF-8 text"))
    } else {
        Ok(AssetContent::Attachment(
            base64::engine::general_purpose::STANDARD.encode(bytes),
        ))
    }
}

// ============================================================================
// FileSystemIndex
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Scanning,
    Ready,
    Failed(String),
}

/// Index of the theme files below a root directory
#[derive(Debug)]
pub struct FileSystemIndex {
    root: PathBuf,
    filter: IgnoreFilter,
    files: DashMap<AssetKey, LocalFile>,
    state: LocalSyncState,
    scan: watch::Receiver<ScanState>,
}

impl FileSystemIndex {
    /// Starts indexing `root` on a background task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(root: impl Into<PathBuf>, filter: IgnoreFilter) -> Arc<Self> {
        let (tx, rx) = watch::channel(ScanState::Scanning);
        let index = Arc::new(Self {
            root: root.into(),
            filter,
            files: DashMap::new(),
            state: LocalSyncState::new(),
            scan: rx,
        });

        let worker = Arc::clone(&index);
        tokio::spawn(async move {
            let state = match worker.scan().await {
                Ok(count) => {
                    info!(root = %worker.root.display(), files = count, "Local theme index ready");
                    ScanState::Ready
                }
                Err(e) => {
                    error!(root = %worker.root.display(), error = %e, "Local theme scan failed");
                    ScanState::Failed(format!("{e:#}"))
                }
            };
            tx.send_replace(state);
        });

        index
    }

    /// Builds the ignore filter from configuration and starts indexing its root
    ///
    /// # Errors
    /// Returns an error if the ignore file exists but cannot be read
    pub async fn from_config(config: &SyncConfig) -> anyhow::Result<Arc<Self>> {
        let filter = IgnoreFilter::from_config(config).await?;
        Ok(Self::spawn(config.root.clone(), filter))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn path_of(&self, key: &AssetKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn scan(&self) -> anyhow::Result<usize> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("Failed to read theme root: {}", self.root.display()))?;
        if !metadata.is_dir() {
            bail!("Theme root is not a directory: {}", self.root.display());
        }

        for folder in THEME_FOLDERS {
            let dir = self.root.join(folder);
            match tokio::fs::metadata(&dir).await {
                Ok(metadata) if metadata.is_dir() => {
                    self.walk_directory(&dir, folder.to_string()).await;
                }
                _ => debug!(folder, "Theme folder absent, skipping"),
            }
        }

        Ok(self.files.len())
    }

    /// Recursively indexes the files below `dir`, keyed relative to the root
    ///
    /// Unreadable directories and files are skipped with a warning.
    fn walk_directory<'a>(
        &'a self,
        dir: &'a Path,
        prefix: String,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                    return;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Directory listing interrupted");
                        break;
                    }
                };
                let entry_path = entry.path();
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    warn!(path = ?entry_path, "Skipping non UTF-8 file name");
                    continue;
                };
                // Editor and OS metadata (.DS_Store, .swp)
                if name.starts_with('.') {
                    continue;
                }

                let relative = format!("{prefix}/{name}");
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        warn!(path = ?entry_path, error = %e, "Skipping entry of unknown type");
                        continue;
                    }
                };
                if file_type.is_dir() {
                    self.walk_directory(&entry_path, relative).await;
                } else if file_type.is_file() {
                    self.index_file(&entry_path, relative).await;
                }
            }
        })
    }

    async fn index_file(&self, path: &Path, relative: String) {
        let key = match AssetKey::new(relative) {
            Ok(key) => key,
            Err(err) => {
                warn!(path = ?path, %err, "Skipping file with invalid asset key");
                return;
            }
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping unreadable local file");
                return;
            }
        };
        let file = LocalFile {
            key: key.clone(),
            checksum: content_checksum(&bytes),
            size: bytes.len() as u64,
            content: None,
        };

        trace!(key = %key, size = file.size, "Indexed local file");
        self.files.insert(key, file);
    }
}

#[async_trait::async_trait]
impl ILocalFileIndex for FileSystemIndex {
    async fn ready(&self) -> anyhow::Result<()> {
        let mut scan = self.scan.clone();
        let state = scan
            .wait_for(|state| *state != ScanState::Scanning)
            .await
            .map_err(|_| anyhow!("Local theme scan task stopped before finishing"))?
            .clone();

        match state {
            ScanState::Failed(reason) => Err(anyhow!(reason)),
            _ => Ok(()),
        }
    }

    fn checksums(&self) -> Vec<Checksum> {
        let mut checksums: Vec<Checksum> = self
            .files
            .iter()
            .map(|entry| entry.value().to_checksum())
            .collect();
        checksums.sort_by(|a, b| a.key.cmp(&b.key));
        checksums
    }

    fn file(&self, key: &AssetKey) -> Option<LocalFile> {
        self.files.get(key).map(|entry| entry.value().clone())
    }

    fn contains(&self, key: &AssetKey) -> bool {
        self.files.contains_key(key)
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn read_content(&self, key: &AssetKey) -> anyhow::Result<AssetContent> {
        if !self.files.contains_key(key) {
            bail!("{key} is not in the local theme index");
        }

        let path = self.path_of(key);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        encode_content(key, bytes)
    }

    fn apply_ignore_filters(&self, checksums: Vec<Checksum>) -> Vec<Checksum> {
        self.filter.filter(checksums)
    }

    fn sync_state(&self) -> &LocalSyncState {
        &self.state
    }
}
