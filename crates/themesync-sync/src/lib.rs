//! themesync Sync - Theme synchronization engine
//!
//! Provides:
//! - Checksum diffing between the local theme and the remote manifest
//! - Dependency-aware ordering of uploads and deletes
//! - Count/size bounded batching of bulk uploads
//! - Staged concurrent execution with bounded per-file retry
//! - Progress counters and per-file results for callers to poll
//!
//! ## Modules
//!
//! - [`engine`] - [`ThemeSyncer`](engine::ThemeSyncer), the entry point driving a sync run
//! - [`differ`] - Upload and delete candidate selection
//! - [`partition`] - File categories and their upload/delete ordering
//! - [`batcher`] - Greedy count/size bounded batching
//! - [`stage`] - Stage graph execution for uploads and deletes
//! - [`retry`] - Failed-subset resubmission and delete failure budget
//! - [`bootstrap`] - Minimal theme assets uploaded before anything else
//! - [`ledger`] - Progress counters, per-file results and failure reports
//! - [`ignore`] - Glob-based ignore filter
//! - [`filesystem`] - Filesystem-backed local file index

pub mod batcher;
pub mod bootstrap;
pub mod differ;
pub mod engine;
pub mod filesystem;
pub mod ignore;
pub mod ledger;
pub mod partition;
pub mod retry;
pub mod stage;


use thiserror::Error;

pub use engine::{SyncHandle, SyncOptions, ThemeSyncer};
pub use ledger::{FailureReport, Progress, SyncProgress, SyncReport};

/// Errors that abort a synchronization run
///
/// Per-file upload failures never show up here; they are recorded as
/// failed results in the ledger instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The minimal theme assets could not be created
    #[error("Failed to create the theme base files: {0}")]
    Bootstrap(String),

    /// Too many remote deletes failed in a single delete pass
    #[error("Delete pass aborted after {failures} failed deletes: {last_error}")]
    DeleteThresholdExceeded {
        /// Failed deletes counted when the pass aborted
        failures: usize,
        /// Reason of the failure that crossed the threshold
        last_error: String,
    },

    /// The local file index failed its initial population
    #[error("Local file index not ready: {0}")]
    IndexNotReady(String),

    /// The run was cancelled through its cancellation token
    #[error("Sync cancelled")]
    Cancelled,

    /// The background task driving the run died
    #[error("Background sync task failed: {0}")]
    Background(String),

    /// A domain-level error propagated from themesync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] themesync_core::domain::errors::DomainError),
}
