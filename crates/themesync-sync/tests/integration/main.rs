//! Integration tests for themesync-sync
//!
//! Drives the ThemeSyncer end to end against a recording in-memory theme
//! store, with both the in-memory and the filesystem local index.


mod test_deferred;
mod test_filesystem;
mod test_ordering;
mod test_upload;
