//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// SyncRunId
// ============================================================================

/// Identifier for a single synchronization run
///
/// Only used to correlate log lines and reports belonging to the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    /// Create a new random SyncRunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SyncRunId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SyncRunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncRunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SyncRunId: {e}")))
    }
}

// ============================================================================
// ThemeId
// ============================================================================

/// Numeric identifier of a remote theme (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ThemeId(u64);

impl ThemeId {
    /// Create a new ThemeId
    ///
    /// # Errors
    /// Returns error if the id is zero
    pub fn new(id: u64) -> Result<Self, DomainError> {
        if id == 0 {
            return Err(DomainError::InvalidThemeId(
                "Theme id must be greater than 0".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner numeric value
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl Display for ThemeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ThemeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u64>()
            .map_err(|e| DomainError::InvalidThemeId(format!("{s}: {e}")))?;
        Self::new(id)
    }
}

impl TryFrom<u64> for ThemeId {
    type Error = DomainError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ThemeId> for u64 {
    fn from(id: ThemeId) -> Self {
        id.0
    }
}

// ============================================================================
// AssetKey
// ============================================================================

/// Key of a theme file, relative to the theme root
///
/// Format: `<folder>/<name>` using `/` separators, e.g. `"sections/header.liquid"`
/// or `"templates/customers/account.json"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetKey(String);

impl AssetKey {
    /// Create a new AssetKey
    ///
    /// # Errors
    /// Returns error if the key is empty, absolute, uses `\` separators,
    /// contains empty or `..` segments, or lacks a folder component
    pub fn new(key: String) -> Result<Self, DomainError> {
        if key.is_empty() {
            return Err(DomainError::InvalidKey("Asset key cannot be empty".to_string()));
        }

        if key.starts_with('/') {
            return Err(DomainError::InvalidKey(format!(
                "Asset key must be relative: {key}"
            )));
        }

        if key.contains('\\') {
            return Err(DomainError::InvalidKey(format!(
                "Asset key must use '/' separators: {key}"
            )));
        }

        if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(DomainError::InvalidKey(format!(
                "Asset key contains an invalid segment: {key}"
            )));
        }

        if !key.contains('/') {
            return Err(DomainError::InvalidKey(format!(
                "Asset key must live inside a theme folder: {key}"
            )));
        }

        Ok(Self(key))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Top-level theme folder, e.g. `"sections"`
    #[must_use]
    pub fn folder(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Last path component, e.g. `"header.liquid"`
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Extension of the file name without the dot, if any
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// Whether the key lives under the given top-level folder
    #[must_use]
    pub fn is_in(&self, folder: &str) -> bool {
        self.folder() == folder
    }
}

impl Display for AssetKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for AssetKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AssetKey> for String {
    fn from(key: AssetKey) -> Self {
        key.0
    }
}

impl AsRef<str> for AssetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
