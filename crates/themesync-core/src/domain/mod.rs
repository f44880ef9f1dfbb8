//! Domain entities and business logic
//!
//! This module contains the core domain types for themesync:
//! - Newtypes for type-safe identifiers and validated asset keys
//! - Asset types (checksums, content, upload parameters and results)
//! - The remote theme descriptor
//! - Domain-specific error types

pub mod asset;
pub mod errors;
pub mod newtypes;
pub mod theme;

// Re-export commonly used types
pub use asset::{
    AssetContent, AssetErrors, AssetParam, AssetResult, Checksum, ChecksumWithSize, LocalFile,
};
pub use errors::DomainError;
pub use newtypes::*;
pub use theme::{Theme, ThemeRole};
