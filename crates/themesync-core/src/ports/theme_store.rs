//! Theme store port (driven/secondary port)
//!
//! This module defines the interface for writing to the remote theme storage
//! service. Only the two capabilities the sync engine needs are exposed: a
//! bulk upload of a batch of files and a single-file delete.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Implementations own their transport concerns (HTTP retries, backoff, rate
//!   limiting). The engine layers its own per-file retry on top of the results.

use crate::domain::asset::{AssetParam, AssetResult};
use crate::domain::newtypes::{AssetKey, ThemeId};

/// Port trait for the remote theme storage service
#[async_trait::async_trait]
pub trait IThemeStore: Send + Sync {
    /// Uploads a batch of files in a single call
    ///
    /// # Arguments
    /// * `theme_id` - The theme receiving the files
    /// * `files` - Files to create or overwrite
    ///
    /// # Returns
    /// One result per file. A per-file failure is reported through
    /// `AssetResult::success == false`; an `Err` means the whole call failed.
    async fn bulk_upload(
        &self,
        theme_id: ThemeId,
        files: Vec<AssetParam>,
    ) -> anyhow::Result<Vec<AssetResult>>;

    /// Deletes a single file from the theme
    ///
    /// # Errors
    /// Returns an error when the remote service refuses or fails the delete
    async fn delete_asset(&self, theme_id: ThemeId, key: &AssetKey) -> anyhow::Result<()>;
}
