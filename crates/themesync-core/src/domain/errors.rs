//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures for asset keys and theme identifiers.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid asset key format or content
    #[error("Invalid asset key: {0}")]
    InvalidKey(String),

    /// Invalid theme identifier
    #[error("Invalid theme id: {0}")]
    InvalidThemeId(String),

    /// An asset was given both or neither of a text value and an attachment
    #[error("Invalid asset content for {key}: {reason}")]
    InvalidContent {
        /// Key of the offending asset
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
