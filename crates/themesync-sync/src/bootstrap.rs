//! Minimal theme assets
//!
//! A theme is only usable once it has a settings schema and the two layouts.
//! Missing ones are created with placeholder content in a single bulk upload
//! before anything else is synced. The upload diff then has to account for
//! these freshly created files, which the remote manifest taken before the
//! run does not contain.

use std::collections::HashSet;

use themesync_core::domain::{AssetContent, AssetKey, AssetParam, Checksum, ThemeId};
use themesync_core::ports::{ILocalFileIndex, IThemeStore};
use tracing::{debug, info, instrument, warn};

use crate::SyncError;

/// Files every theme must have, with the content used to create them
pub const MINIMUM_THEME_ASSETS: [(&str, &str); 3] = [
    ("config/settings_schema.json", "[]"),
    (
        "layout/password.liquid",
        "{{ content_for_header }}{{ content_for_layout }}",
    ),
    (
        "layout/theme.liquid",
        "{{ content_for_header }}{{ content_for_layout }}",
    ),
];

/// Checksum recorded for a created asset whose local version differs
///
/// Never equal to a real checksum, so the local file is always uploaded.
pub const PLACEHOLDER_CHECKSUM: &str = "";

/// Minimal assets absent from the remote manifest, in declaration order
///
/// # Errors
/// Returns an error only if a built-in key is invalid
pub fn missing_assets(remote: &[Checksum]) -> Result<Vec<AssetParam>, SyncError> {
    let present: HashSet<&str> = remote.iter().map(|c| c.key.as_str()).collect();

    MINIMUM_THEME_ASSETS
        .iter()
        .filter(|(key, _)| !present.contains(key))
        .map(|(key, value)| {
            let key = AssetKey::new((*key).to_string())?;
            Ok(AssetParam::new(key, AssetContent::Value((*value).to_string())))
        })
        .collect()
}

/// Creates the missing minimal assets in one bulk upload
///
/// Returns the created assets; an empty list means nothing was missing and
/// the store was not called.
///
/// # Errors
/// Returns [`SyncError::Bootstrap`] if the call fails or any file is rejected
#[instrument(skip_all, fields(theme_id = %theme_id))]
pub async fn ensure_theme_assets(
    store: &dyn IThemeStore,
    theme_id: ThemeId,
    remote: &[Checksum],
) -> Result<Vec<AssetParam>, SyncError> {
    let missing = missing_assets(remote)?;
    if missing.is_empty() {
        debug!("Theme already has its minimal assets");
        return Ok(missing);
    }

    info!(count = missing.len(), "Creating minimal theme assets");
    let results = store
        .bulk_upload(theme_id, missing.clone())
        .await
        .map_err(|e| SyncError::Bootstrap(format!("{e:#}")))?;

    let rejected: Vec<String> = results
        .iter()
        .filter(|result| !result.success)
        .map(|result| match result.reasons() {
            [] => result.key.to_string(),
            reasons => format!("{}: {}", result.key, reasons.join("; ")),
        })
        .collect();
    if !rejected.is_empty() {
        warn!(rejected = rejected.len(), "Minimal theme assets were rejected");
        return Err(SyncError::Bootstrap(rejected.join(", ")));
    }

    Ok(missing)
}

/// Remote manifest used for the upload diff after bootstrap
///
/// Each created asset joins the manifest. It carries the local checksum when
/// the local file holds exactly the placeholder content (nothing left to
/// upload), and [`PLACEHOLDER_CHECKSUM`] otherwise.
pub async fn reconcile_manifest(
    remote: &[Checksum],
    created: &[AssetParam],
    index: &dyn ILocalFileIndex,
) -> Vec<Checksum> {
    let mut manifest = remote.to_vec();

    for param in created {
        let checksum = match index.file(&param.key) {
            Some(local) => match index.read_content(&param.key).await {
                Ok(content) if content == param.content => local.checksum,
                _ => PLACEHOLDER_CHECKSUM.to_string(),
            },
            None => PLACEHOLDER_CHECKSUM.to_string(),
        };
        manifest.push(Checksum::new(param.key.clone(), checksum));
    }

    manifest
}
