//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IThemeStore`] - Remote theme storage (bulk upload, single delete)
//! - [`ILocalFileIndex`] - Local theme files, ignore filtering and sync bookkeeping

pub mod local_index;
pub mod theme_store;

pub use local_index::{ILocalFileIndex, LocalSyncState};
pub use theme_store::IThemeStore;
