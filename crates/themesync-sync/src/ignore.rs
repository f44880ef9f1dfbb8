//! Glob-based ignore filter
//!
//! Evaluates `ignore` and `only` patterns against asset keys. A key passes
//! the filter when it matches at least one `only` pattern (or no `only`
//! patterns are configured) and matches none of the `ignore` patterns.
//!
//! Pattern conventions:
//! - A pattern ending in `/` matches everything below that folder.
//! - A pattern without `/` is also tried against the file name alone, so
//!   `*.map` matches `assets/theme.js.map`.

use std::path::Path;

use anyhow::Context;
use glob::Pattern;
use themesync_core::config::SyncConfig;
use themesync_core::domain::{AssetKey, Checksum};
use tracing::{debug, trace, warn};

/// A compiled glob with its matching mode
#[derive(Debug, Clone)]
struct KeyPattern {
    pattern: Pattern,
    match_file_name: bool,
}

impl KeyPattern {
    fn compile(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let source = if trimmed.ends_with('/') {
            format!("{trimmed}*")
        } else {
            trimmed.to_string()
        };

        match Pattern::new(&source) {
            Ok(pattern) => Some(Self {
                pattern,
                match_file_name: !trimmed.contains('/'),
            }),
            Err(e) => {
                warn!(pattern = %raw, error = %e, "Skipping invalid ignore pattern");
                None
            }
        }
    }

    fn matches(&self, key: &AssetKey) -> bool {
        self.pattern.matches(key.as_str())
            || (self.match_file_name && self.pattern.matches(key.file_name()))
    }
}

/// Filter deciding which keys take part in synchronization
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    ignore: Vec<KeyPattern>,
    only: Vec<KeyPattern>,
}

impl IgnoreFilter {
    /// Creates a filter from raw pattern lists
    ///
    /// Invalid patterns are logged and skipped.
    pub fn new<I, O>(ignore: I, only: O) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        O: IntoIterator,
        O::Item: AsRef<str>,
    {
        let ignore: Vec<KeyPattern> = ignore
            .into_iter()
            .filter_map(|p| KeyPattern::compile(p.as_ref()))
            .collect();
        let only: Vec<KeyPattern> = only
            .into_iter()
            .filter_map(|p| KeyPattern::compile(p.as_ref()))
            .collect();

        debug!(
            ignore_count = ignore.len(),
            only_count = only.len(),
            "IgnoreFilter initialized"
        );

        Self { ignore, only }
    }

    /// Builds the filter for a theme from its sync configuration
    ///
    /// Patterns from the ignore file inside the theme root (if present) are
    /// appended to the configured `ignore` list.
    pub async fn from_config(config: &SyncConfig) -> anyhow::Result<Self> {
        let mut ignore = config.ignore.clone();
        let ignore_file = config.root.join(&config.ignore_file);
        ignore.extend(read_ignore_file(&ignore_file).await?);
        Ok(Self::new(ignore, &config.only))
    }

    /// Returns true if the key must be left out of synchronization
    pub fn is_ignored(&self, key: &AssetKey) -> bool {
        if !self.only.is_empty() && !self.only.iter().any(|p| p.matches(key)) {
            trace!(key = %key, "Key not selected by any only pattern");
            return true;
        }

        let ignored = self.ignore.iter().any(|p| p.matches(key));
        if ignored {
            trace!(key = %key, "Key matched an ignore pattern");
        }
        ignored
    }

    /// Removes ignored entries from a checksum list, preserving order
    pub fn filter(&self, checksums: Vec<Checksum>) -> Vec<Checksum> {
        checksums
            .into_iter()
            .filter(|checksum| !self.is_ignored(&checksum.key))
            .collect()
    }
}

/// Reads patterns from an ignore file, one per line
///
/// Blank lines and `#` comments are skipped. A missing file yields no patterns.
async fn read_ignore_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read ignore file: {}", path.display()))
        }
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
