//! Theme asset types
//!
//! Value types exchanged between the local file index, the sync engine and
//! the remote theme store: checksum manifest entries, local file snapshots,
//! upload parameters and per-file upload results.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::AssetKey;

// ============================================================================
// Checksums
// ============================================================================

/// A single `{key, checksum}` entry of a checksum manifest
///
/// The checksum is opaque: the engine only ever compares it for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub key: AssetKey,
    pub checksum: String,
}

impl Checksum {
    pub fn new(key: AssetKey, checksum: impl Into<String>) -> Self {
        Self {
            key,
            checksum: checksum.into(),
        }
    }
}

/// A [`Checksum`] extended with the byte size of the file
///
/// Only used for batching decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChecksumWithSize {
    pub key: AssetKey,
    pub checksum: String,
    pub size: u64,
}

impl ChecksumWithSize {
    pub fn new(checksum: Checksum, size: u64) -> Self {
        Self {
            key: checksum.key,
            checksum: checksum.checksum,
            size,
        }
    }
}

// ============================================================================
// Content
// ============================================================================

/// Content of an asset as sent to the theme store
///
/// Text files travel as `value`, binary files as a base64 `attachment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetContent {
    Value(String),
    Attachment(String),
}

impl AssetContent {
    /// Size of the encoded payload in bytes
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Value(text) | Self::Attachment(text) => text.len() as u64,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot of a local theme file owned by the local file index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub key: AssetKey,
    pub checksum: String,
    /// Size of the file on disk in bytes
    pub size: u64,
    /// Loaded content, `None` until read from disk
    pub content: Option<AssetContent>,
}

impl LocalFile {
    /// Manifest entry describing this file
    #[must_use]
    pub fn to_checksum(&self) -> Checksum {
        Checksum::new(self.key.clone(), self.checksum.clone())
    }
}

// ============================================================================
// Upload parameters and results
// ============================================================================

/// One file of a bulk upload call
///
/// Serializes as `{"key": ..., "value": ...}` or `{"key": ..., "attachment": ...}`,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetParam {
    pub key: AssetKey,
    #[serde(flatten)]
    pub content: AssetContent,
}

impl AssetParam {
    pub fn new(key: AssetKey, content: AssetContent) -> Self {
        Self { key, content }
    }

    /// Build an upload parameter from optional `value` / `attachment` fields
    ///
    /// # Errors
    /// Returns error unless exactly one of the two is present
    pub fn from_parts(
        key: AssetKey,
        value: Option<String>,
        attachment: Option<String>,
    ) -> Result<Self, DomainError> {
        let content = match (value, attachment) {
            (Some(value), None) => AssetContent::Value(value),
            (None, Some(attachment)) => AssetContent::Attachment(attachment),
            (Some(_), Some(_)) => {
                return Err(DomainError::InvalidContent {
                    key: key.to_string(),
                    reason: "both value and attachment present".to_string(),
                })
            }
            (None, None) => {
                return Err(DomainError::InvalidContent {
                    key: key.to_string(),
                    reason: "missing value and attachment".to_string(),
                })
            }
        };
        Ok(Self { key, content })
    }
}

/// Error details attached to a failed [`AssetResult`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetErrors {
    #[serde(default)]
    pub asset: Vec<String>,
}

/// Outcome of uploading (or deleting) a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResult {
    pub key: AssetKey,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<AssetErrors>,
}

impl AssetResult {
    pub fn succeeded(key: AssetKey) -> Self {
        Self {
            key,
            success: true,
            errors: None,
        }
    }

    pub fn failed(key: AssetKey, reasons: Vec<String>) -> Self {
        Self {
            key,
            success: false,
            errors: Some(AssetErrors { asset: reasons }),
        }
    }

    /// Failure reasons reported for this file (empty on success)
    #[must_use]
    pub fn reasons(&self) -> &[String] {
        self.errors
            .as_ref()
            .map(|errors| errors.asset.as_slice())
            .unwrap_or_default()
    }
}
