//! Checksum diffing between the local theme and the remote manifest
//!
//! The differ is pure: given a remote manifest and a local index it decides
//! which files must be uploaded and which remote files must be deleted.
//! Upload and delete candidates are computed against separate manifests by
//! the engine (see [`crate::bootstrap`]), so both halves are exposed.

use std::collections::{HashMap, HashSet};

use themesync_core::domain::{AssetKey, Checksum};
use themesync_core::ports::ILocalFileIndex;
use tracing::debug;

/// Upload and delete candidates of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumDiff {
    /// Local files whose checksum is absent from or differs from the remote
    pub upload_candidates: Vec<Checksum>,
    /// Remote files with no local counterpart
    pub delete_candidates: Vec<Checksum>,
}

/// Computes both candidate lists against the same remote manifest
pub fn diff(remote: &[Checksum], index: &dyn ILocalFileIndex) -> ChecksumDiff {
    ChecksumDiff {
        upload_candidates: upload_candidates(remote, index),
        delete_candidates: delete_candidates(remote, index),
    }
}

/// Drops remote entries that the platform compiles from a Liquid source
///
/// `assets/x` is generated when `assets/x.liquid` is also present remotely.
/// Generated entries never count as remote files, so they are neither
/// compared against local files nor deleted.
pub fn reject_generated_static_assets(remote: &[Checksum]) -> Vec<Checksum> {
    let liquid_sources: HashSet<&str> = remote
        .iter()
        .filter(|c| c.key.is_in("assets"))
        .filter_map(|c| c.key.as_str().strip_suffix(".liquid"))
        .collect();

    remote
        .iter()
        .filter(|c| !liquid_sources.contains(c.key.as_str()))
        .cloned()
        .collect()
}

/// Local files that must be uploaded, in local index order
///
/// Ignore filters are applied to the local checksums before comparing.
pub fn upload_candidates(remote: &[Checksum], index: &dyn ILocalFileIndex) -> Vec<Checksum> {
    let remote = reject_generated_static_assets(remote);
    let remote_by_key: HashMap<&AssetKey, &str> = remote
        .iter()
        .map(|c| (&c.key, c.checksum.as_str()))
        .collect();

    let local = index.apply_ignore_filters(index.checksums());
    let candidates: Vec<Checksum> = local
        .into_iter()
        .filter(|c| remote_by_key.get(&c.key) != Some(&c.checksum.as_str()))
        .collect();

    debug!(
        remote = remote.len(),
        candidates = candidates.len(),
        "Selected upload candidates"
    );
    candidates
}

/// Remote files that must be deleted, in remote manifest order
///
/// Ignored remote files are never deleted.
pub fn delete_candidates(remote: &[Checksum], index: &dyn ILocalFileIndex) -> Vec<Checksum> {
    let remote = index.apply_ignore_filters(reject_generated_static_assets(remote));
    let candidates: Vec<Checksum> = remote
        .into_iter()
        .filter(|c| !index.contains(&c.key))
        .collect();

    debug!(candidates = candidates.len(), "Selected delete candidates");
    candidates
}
